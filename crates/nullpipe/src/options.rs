#![allow(clippy::struct_excessive_bools)]

use std::time::Duration;

use tracing::warn;

use crate::{ConfigError, pagination::ESCAPE_LEN};

/// Default size of the read-ahead buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;

/// Smallest accepted buffer. It must hold several escape sequences so the
/// bytes withheld at the tail never fill it.
pub const MIN_BUFFER_SIZE: usize = ESCAPE_LEN * 6;

/// Configuration for a [`StreamPump`](crate::StreamPump).
///
/// # Examples
///
/// ```rust
/// use nullpipe::PumpOptions;
///
/// let options = PumpOptions {
///     pass_through: true,
///     write_pagination: true,
///     throttle: 64 * 1024,
///     ..Default::default()
/// };
/// ```
///
/// # Default
///
/// Every flag defaults to `false`, every counter to `0` (disabled), and the
/// buffer to [`DEFAULT_BUFFER_SIZE`].
#[derive(Debug, Clone)]
pub struct PumpOptions {
    /// Size of the read-ahead buffer in bytes.
    ///
    /// # Default
    ///
    /// [`DEFAULT_BUFFER_SIZE`]
    pub buffer_size: usize,

    /// Read the whole input before releasing anything.
    ///
    /// The buffer doubles whenever it fills instead of being drained.
    ///
    /// # Default
    ///
    /// `false`
    pub read_all: bool,

    /// Print a `.` to the progress writer for every this many bytes released.
    ///
    /// # Default
    ///
    /// `0` (off)
    pub dot_every: u64,

    /// Print the current write rate this often.
    ///
    /// # Default
    ///
    /// `None`
    pub rate_every: Option<Duration>,

    /// Stop reading after this many input bytes. Whatever was read is still
    /// released normally.
    ///
    /// # Default
    ///
    /// `0` (no cap)
    pub stop_after: u64,

    /// Ceiling on released bytes per second.
    ///
    /// # Default
    ///
    /// `0` (unthrottled)
    pub throttle: u64,

    /// Copy the input to the pass-through sink (standard output).
    ///
    /// # Default
    ///
    /// `false`
    pub pass_through: bool,

    /// Expect the input to be framed with pagination escapes and strip them.
    ///
    /// # Default
    ///
    /// `false`
    pub read_pagination: bool,

    /// Frame the pass-through output with pagination escapes. Requires
    /// [`pass_through`](Self::pass_through).
    ///
    /// # Default
    ///
    /// `false`
    pub write_pagination: bool,

    /// Compute an MD5 signature of every released byte.
    ///
    /// # Default
    ///
    /// `false`
    pub digest: bool,

    /// Wait for readiness before each read and tolerate reads that would
    /// block.
    ///
    /// # Default
    ///
    /// `false`
    pub non_blocking: bool,

    /// Flush every sink after each write.
    ///
    /// # Default
    ///
    /// `false`
    pub flush_each_write: bool,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_all: false,
            dot_every: 0,
            rate_every: None,
            stop_after: 0,
            throttle: 0,
            pass_through: false,
            read_pagination: false,
            write_pagination: false,
            digest: false,
            non_blocking: false,
            flush_each_write: false,
        }
    }
}

impl PumpOptions {
    /// Normalize dependent flags and reject unusable settings.
    ///
    /// Write pagination without pass-through has nowhere to go and is turned
    /// off with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a buffer smaller than [`MIN_BUFFER_SIZE`] or
    /// a zero rate report interval.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::BufferTooSmall {
                size: self.buffer_size,
                min: MIN_BUFFER_SIZE,
            });
        }
        if self.rate_every.is_some_and(|every| every.is_zero()) {
            return Err(ConfigError::NonPositiveRateInterval);
        }
        if self.write_pagination && !self.pass_through {
            warn!("disabling write pagination since pass-through is disabled");
            self.write_pagination = false;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = PumpOptions::default().validate().unwrap();
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn write_pagination_needs_pass_through() {
        let options = PumpOptions {
            write_pagination: true,
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert!(!options.write_pagination);
    }

    #[test]
    fn tiny_buffer_rejected() {
        let err = PumpOptions {
            buffer_size: 8,
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::BufferTooSmall {
                size: 8,
                min: MIN_BUFFER_SIZE
            }
        );
    }

    #[test]
    fn zero_rate_interval_rejected() {
        let err = PumpOptions {
            rate_every: Some(Duration::ZERO),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveRateInterval);
    }
}
