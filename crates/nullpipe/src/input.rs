use std::io::{self, ErrorKind, Read};

/// Result of one read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    Eof,
    /// Nothing available yet; try again after [`Source::wait_ready`].
    NotReady,
}

/// Byte source feeding the pump.
pub trait Source {
    /// Block until input is likely available.
    ///
    /// Returns `Ok(false)` when the wait ended without the source becoming
    /// readable; the pump simply waits again.
    ///
    /// # Errors
    ///
    /// Any error from the underlying wait primitive is fatal.
    fn wait_ready(&mut self) -> io::Result<bool> {
        Ok(true)
    }

    /// Read into `buf`, which is never empty.
    ///
    /// # Errors
    ///
    /// Hard read errors. `Interrupted` is retried internally and
    /// `WouldBlock` is reported as [`ReadOutcome::NotReady`].
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;
}

fn classify(result: io::Result<usize>) -> Option<io::Result<ReadOutcome>> {
    match result {
        Ok(0) => Some(Ok(ReadOutcome::Eof)),
        Ok(n) => Some(Ok(ReadOutcome::Data(n))),
        Err(e) if e.kind() == ErrorKind::Interrupted => None,
        Err(e) if e.kind() == ErrorKind::WouldBlock => Some(Ok(ReadOutcome::NotReady)),
        Err(e) => Some(Err(e)),
    }
}

/// Any [`Read`] used with ordinary blocking reads.
#[derive(Debug)]
pub struct Blocking<R>(pub R);

impl<R: Read> Source for Blocking<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        loop {
            if let Some(outcome) = classify(self.0.read(buf)) {
                return outcome;
            }
        }
    }
}

#[cfg(unix)]
pub use self::unix::NonBlocking;

#[cfg(unix)]
mod unix {
    use std::io::{self, Read};
    use std::os::fd::{AsRawFd, RawFd};

    use tracing::trace;

    use super::{ReadOutcome, Source, classify};

    /// A file descriptor switched to `O_NONBLOCK`, polled before each read.
    #[derive(Debug)]
    pub struct NonBlocking<R> {
        inner: R,
        fd: RawFd,
    }

    impl<R: Read + AsRawFd> NonBlocking<R> {
        /// Put `inner`'s descriptor into non-blocking mode.
        ///
        /// # Errors
        ///
        /// Fails if the descriptor flags cannot be read or changed.
        pub fn new(inner: R) -> io::Result<Self> {
            let fd = inner.as_raw_fd();
            // SAFETY: `fd` is owned by `inner`, which outlives this call.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: as above; only the status flags are changed.
            if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { inner, fd })
        }
    }

    impl<R: Read> Source for NonBlocking<R> {
        fn wait_ready(&mut self) -> io::Result<bool> {
            let mut pfd = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
            let ret = unsafe { libc::poll(&raw mut pfd, 1, -1) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(false);
                }
                return Err(err);
            }
            trace!(revents = pfd.revents, "input ready");
            // Hang-up still has to be read to observe end-of-input.
            Ok(pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        }

        fn read_into(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
            loop {
                if let Some(outcome) = classify(self.inner.read(buf)) {
                    return outcome;
                }
            }
        }
    }
}
