//! The relay loop.
//!
//! One [`StreamPump`] owns the read buffer, the pagination state machines,
//! the rate limiter and every sink for the life of a stream. Each turn of the
//! loop reads at most once, validates what it can, asks the limiter how much
//! to release, and fans the released prefix of the buffer out to the sinks.
//!
//! Buffer bookkeeping
//! - `validated` counts the bytes at the head of the buffer that the decoder
//!   has already cleared as payload. Only those may be released. With
//!   pagination reading off, everything buffered counts as validated.
//! - The decoder only ever sees the region past `validated`, so escape bytes
//!   are removed exactly once even when releases lag behind reads.
//! - Releasing consumes from the head; `validated` shrinks by the same amount.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{
    PumpError, PumpOptions, Sinks,
    buffer::ReadBuffer,
    digest::{IncrementalDigest, Md5, Signature},
    input::{ReadOutcome, Source},
    pagination::{Decoded, PageDecoder, PageEncoder},
    report::Progress,
    throttle::{Clock, RateLimiter, SystemClock},
};

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    /// Bytes read from the source, framing included.
    pub bytes_read: u64,
    /// Payload bytes released to the sinks.
    pub bytes_released: u64,
    pub elapsed: Duration,
    /// MD5 of the released payload, when enabled.
    pub digest: Option<Signature>,
}

pub struct StreamPump<S, C = SystemClock> {
    options: PumpOptions,
    source: S,
    sinks: Sinks,
    buf: ReadBuffer,
    decoder: Option<PageDecoder>,
    encoder: Option<PageEncoder>,
    limiter: Option<RateLimiter<C>>,
    digest: Option<Md5>,
    progress: Progress,
    scratch: Vec<u8>,
    validated: usize,
    eof: bool,
    bytes_read: u64,
    bytes_released: u64,
    start: Instant,
}

impl<S: Source> StreamPump<S> {
    /// Build a pump that paces with the system clock.
    ///
    /// # Errors
    ///
    /// Invalid options or a failed buffer allocation.
    pub fn new(options: PumpOptions, source: S, sinks: Sinks) -> Result<Self, PumpError> {
        Self::with_clock(options, source, sinks, SystemClock)
    }
}

impl<S: Source, C: Clock> StreamPump<S, C> {
    /// Build a pump whose rate limiter reads time from `clock`.
    ///
    /// Pass-through output goes to the writer configured on `sinks`, or to
    /// standard output if none was set; it is dropped unless
    /// [`PumpOptions::pass_through`] is enabled.
    ///
    /// # Errors
    ///
    /// Invalid options or a failed buffer allocation.
    pub fn with_clock(
        options: PumpOptions,
        source: S,
        mut sinks: Sinks,
        clock: C,
    ) -> Result<Self, PumpError> {
        let options = options.validate()?;
        sinks.set_pass_through_enabled(options.pass_through);

        let buf = ReadBuffer::with_capacity(options.buffer_size)?;
        let limiter = (options.throttle > 0)
            .then(|| RateLimiter::with_clock(options.throttle, clock));
        let progress = Progress::new(
            Box::new(io::stderr()),
            options.dot_every,
            options.rate_every,
        );

        Ok(Self {
            decoder: options.read_pagination.then(PageDecoder::new),
            encoder: options.write_pagination.then(PageEncoder::new),
            digest: options.digest.then(Md5::new),
            options,
            source,
            sinks,
            buf,
            limiter,
            progress,
            scratch: Vec::new(),
            validated: 0,
            eof: false,
            bytes_read: 0,
            bytes_released: 0,
            start: Instant::now(),
        })
    }

    /// Send dots and rate lines to `out` instead of standard error.
    #[must_use]
    pub fn with_progress_writer(mut self, out: impl Write + 'static) -> Self {
        self.progress = Progress::new(
            Box::new(out),
            self.options.dot_every,
            self.options.rate_every,
        );
        self
    }

    /// Relay the whole stream.
    ///
    /// # Errors
    ///
    /// Any fatal [`PumpError`]. Sinks are not flushed on the error path.
    pub fn run(mut self) -> Result<PumpReport, PumpError> {
        if let Some(encoder) = self.encoder.as_mut() {
            self.scratch.clear();
            encoder.begin(&mut self.scratch);
            self.sinks.write_pass(&self.scratch)?;
        }

        loop {
            if !self.eof {
                self.fill()?;
            }

            let mut ready = self.validate()?;
            if self.options.read_all && !self.eof {
                ready = 0;
            }

            let permit = match self.limiter.as_mut() {
                Some(limiter) => limiter.admit(ready),
                None => ready,
            };
            if permit > 0 {
                let released = self.release(permit)?;
                if let Some(limiter) = self.limiter.as_mut() {
                    limiter.record(released);
                    if released == 0 {
                        limiter.stall();
                    }
                }
            }

            self.progress.tick(Instant::now());

            if self.eof && self.buf.is_empty() {
                break;
            }
        }

        self.finish()
    }

    /// Attempt one read into the buffer tail.
    fn fill(&mut self) -> Result<(), PumpError> {
        if self.buf.is_full() {
            if !self.options.read_all {
                return Ok(());
            }
            self.buf.grow()?;
            debug!(capacity = self.buf.capacity(), "grew read buffer");
        }

        if self.options.non_blocking && !self.source.wait_ready().map_err(PumpError::Wait)? {
            return Ok(());
        }

        let want = if self.options.stop_after > 0 {
            usize::try_from(self.options.stop_after - self.bytes_read).unwrap_or(usize::MAX)
        } else {
            usize::MAX
        };

        let spare = self.buf.spare_mut(want);
        match self.source.read_into(spare).map_err(PumpError::Read)? {
            ReadOutcome::Data(n) => {
                self.buf.commit(n);
                self.bytes_read += n as u64;
                trace!("read {n} bytes");
                if self.options.stop_after > 0 && self.bytes_read >= self.options.stop_after {
                    debug!(bytes = self.bytes_read, "stop-after limit reached");
                    self.eof = true;
                }
            }
            ReadOutcome::Eof => {
                debug!(bytes = self.bytes_read, "end of input");
                self.eof = true;
            }
            ReadOutcome::NotReady => trace!("input not ready"),
        }
        Ok(())
    }

    /// Run the decoder over the unvalidated tail and return how many bytes at
    /// the head may be released.
    fn validate(&mut self) -> Result<usize, PumpError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(self.buf.len());
        };
        let window = self.buf.tail_from_mut(self.validated);
        let Decoded { safe, len } = decoder.decode(window, self.eof)?;
        self.buf.truncate(self.validated + len);
        self.validated += safe;
        Ok(self.validated)
    }

    /// Fan out the first `permit` buffered bytes and drop them from the
    /// buffer. Returns how many were released, which is short of `permit`
    /// only when the encoder withholds a marker prefix.
    fn release(&mut self, permit: usize) -> Result<usize, PumpError> {
        let last = self.eof && permit == self.buf.len();
        let data = &self.buf.as_slice()[..permit];

        let released = match self.encoder.as_mut() {
            Some(encoder) => {
                self.scratch.clear();
                let used = encoder.encode(data, last, &mut self.scratch);
                self.sinks.write_pass(&self.scratch)?;
                used
            }
            None => {
                self.sinks.write_pass(data)?;
                permit
            }
        };
        let data = &data[..released];

        if let Some(digest) = self.digest.as_mut() {
            digest.absorb(data);
        }
        self.sinks.write_files(data)?;
        trace!("wrote {released} bytes");

        self.progress.advance(released);
        self.buf.consume(released);
        self.validated = self.validated.saturating_sub(released);
        self.bytes_released += released as u64;
        Ok(released)
    }

    fn finish(mut self) -> Result<PumpReport, PumpError> {
        let _ = self.progress.finish();

        if let Some(encoder) = self.encoder.as_mut() {
            self.scratch.clear();
            encoder.finish(&mut self.scratch);
            self.sinks.write_pass(&self.scratch)?;
        }
        self.sinks.close()?;

        Ok(PumpReport {
            bytes_read: self.bytes_read,
            bytes_released: self.bytes_released,
            elapsed: self.start.elapsed(),
            digest: self.digest.map(IncrementalDigest::finalize),
        })
    }
}
