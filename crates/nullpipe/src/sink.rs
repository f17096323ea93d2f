use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::PumpError;

enum FileState {
    Unopened,
    Open(BufWriter<File>),
    /// Open failed; skipped for the rest of the run.
    Failed,
    Closed,
}

/// Output file opened on the first write.
pub struct FileSink {
    path: PathBuf,
    state: FileState,
}

impl fmt::Debug for FileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            FileState::Unopened => "unopened",
            FileState::Open(_) => "open",
            FileState::Failed => "failed",
            FileState::Closed => "closed",
        };
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("state", &state)
            .finish()
    }
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: FileState::Unopened,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, FileState::Failed)
    }

    fn open_if_needed(&mut self) {
        if let FileState::Unopened = self.state {
            self.state = match File::create(&self.path) {
                Ok(file) => {
                    debug!(path = %self.path.display(), "opened output file");
                    FileState::Open(BufWriter::new(file))
                }
                Err(e) => {
                    warn!("cannot open({}): {e}", self.path.display());
                    FileState::Failed
                }
            };
        }
    }

    fn write(&mut self, bytes: &[u8], flush: bool) -> Result<(), PumpError> {
        self.open_if_needed();
        let FileState::Open(w) = &mut self.state else {
            return Ok(());
        };
        w.write_all(bytes)
            .map_err(|e| PumpError::write(self.path.display(), e))?;
        if flush {
            w.flush()
                .map_err(|e| PumpError::flush(self.path.display(), e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), PumpError> {
        if let FileState::Open(w) = &mut self.state {
            w.flush()
                .map_err(|e| PumpError::flush(self.path.display(), e))?;
            self.state = FileState::Closed;
        }
        Ok(())
    }
}

const PASS_THROUGH: &str = "standard output";

/// Every destination the pump writes released bytes to.
///
/// The pass-through sink receives the (optionally paginated) stream; file
/// sinks always receive the raw payload.
pub struct Sinks {
    pass: Option<Box<dyn Write>>,
    files: Vec<FileSink>,
    flush_each_write: bool,
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sinks")
            .field("pass", &self.pass.is_some())
            .field("files", &self.files)
            .field("flush_each_write", &self.flush_each_write)
            .finish()
    }
}

impl Sinks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pass: None,
            files: Vec::new(),
            flush_each_write: false,
        }
    }

    /// Route pass-through output to `writer`.
    #[must_use]
    pub fn with_pass_through(mut self, writer: impl Write + 'static) -> Self {
        self.pass = Some(Box::new(writer));
        self
    }

    #[must_use]
    pub fn with_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(paths.into_iter().map(FileSink::new));
        self
    }

    #[must_use]
    pub fn flush_each_write(mut self, flush: bool) -> Self {
        self.flush_each_write = flush;
        self
    }

    #[must_use]
    pub fn has_pass_through(&self) -> bool {
        self.pass.is_some()
    }

    #[must_use]
    pub fn files(&self) -> &[FileSink] {
        &self.files
    }

    /// Drop the pass-through writer, or fall back to standard output when
    /// enabling without one.
    pub(crate) fn set_pass_through_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.pass = None;
        } else if self.pass.is_none() {
            self.pass = Some(Box::new(io::stdout()));
        }
    }

    pub(crate) fn write_pass(&mut self, bytes: &[u8]) -> Result<(), PumpError> {
        let Some(w) = self.pass.as_mut() else {
            return Ok(());
        };
        if bytes.is_empty() {
            return Ok(());
        }
        w.write_all(bytes)
            .map_err(|e| PumpError::write(PASS_THROUGH, e))?;
        if self.flush_each_write {
            w.flush().map_err(|e| PumpError::flush(PASS_THROUGH, e))?;
        }
        Ok(())
    }

    pub(crate) fn write_files(&mut self, bytes: &[u8]) -> Result<(), PumpError> {
        for file in &mut self.files {
            file.write(bytes, self.flush_each_write)?;
        }
        Ok(())
    }

    /// Flush and close every sink. Idempotent.
    pub(crate) fn close(&mut self) -> Result<(), PumpError> {
        for file in &mut self.files {
            file.close()?;
        }
        if let Some(w) = self.pass.as_mut() {
            w.flush().map_err(|e| PumpError::flush(PASS_THROUGH, e))?;
        }
        Ok(())
    }
}

impl Default for Sinks {
    fn default() -> Self {
        Self::new()
    }
}

/// A `Write` handle onto a shared byte vector, for capturing output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl SharedBuf {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_receives_bytes() {
        let out = SharedBuf::new();
        let mut sinks = Sinks::new().with_pass_through(out.clone());
        sinks.write_pass(b"abc").unwrap();
        sinks.close().unwrap();
        assert_eq!(out.contents(), b"abc");
    }

    #[test]
    fn missing_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.out");
        let bad = dir.path().join("no-such-dir").join("bad.out");
        let mut sinks = Sinks::new().with_files([bad.clone(), good.clone()]);

        sinks.write_files(b"one ").unwrap();
        sinks.write_files(b"two").unwrap();
        sinks.close().unwrap();

        assert!(sinks.files()[0].is_failed());
        assert!(!bad.exists());
        assert_eq!(std::fs::read(&good).unwrap(), b"one two");
    }

    #[test]
    fn files_are_not_created_before_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.out");
        let mut sinks = Sinks::new().with_files([path.clone()]);
        assert!(!path.exists());
        sinks.write_files(b"x").unwrap();
        assert!(path.exists());
        sinks.close().unwrap();
        sinks.close().unwrap();
    }

    #[test]
    fn failing_writer_is_fatal() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut sinks = Sinks::new().with_pass_through(Full);
        let err = sinks.write_pass(b"abc").unwrap_err();
        assert!(matches!(err, PumpError::Write { ref sink, .. } if sink == PASS_THROUGH));
    }
}
