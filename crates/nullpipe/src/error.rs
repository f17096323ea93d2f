use std::io;

use thiserror::Error;

/// Structural violations of the in-band pagination framing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PaginationError {
    #[error("did not get pagination start")]
    MissingStart,
    #[error("got an invalid pagination sequence (tag byte {0:#04x})")]
    InvalidTag(u8),
    #[error("did not get pagination end")]
    MissingEnd,
}

/// Rejected pump configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("buffer size {size} is below the minimum of {min} bytes")]
    BufferTooSmall { size: usize, min: usize },
    #[error("rate report interval must be positive")]
    NonPositiveRateInterval,
}

/// Fatal errors raised while relaying a stream.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("read on input error: {0}")]
    Read(#[source] io::Error),
    #[error("waiting for input error: {0}")]
    Wait(#[source] io::Error),
    #[error("could not write block to {sink}: {source}")]
    Write {
        sink: String,
        #[source]
        source: io::Error,
    },
    #[error("could not flush {sink}: {source}")]
    Flush {
        sink: String,
        #[source]
        source: io::Error,
    },
    #[error("could not allocate {bytes} bytes for buffer")]
    Alloc { bytes: usize },
}

impl PumpError {
    pub(crate) fn write(sink: impl ToString, source: io::Error) -> Self {
        Self::Write {
            sink: sink.to_string(),
            source,
        }
    }

    pub(crate) fn flush(sink: impl ToString, source: io::Error) -> Self {
        Self::Flush {
            sink: sink.to_string(),
            source,
        }
    }
}
