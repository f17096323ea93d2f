use core::fmt;

/// A 16-byte content signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 16]);

impl fmt::Display for Signature {
    /// Lowercase hex, 32 characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Hash absorbed incrementally and finalized exactly once.
pub trait IncrementalDigest {
    fn absorb(&mut self, bytes: &[u8]);
    fn finalize(self) -> Signature;
}

/// MD5 over every byte the pump releases.
#[derive(Clone)]
pub struct Md5(md5::Context);

impl Md5 {
    #[must_use]
    pub fn new() -> Self {
        Self(md5::Context::new())
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Md5").finish_non_exhaustive()
    }
}

impl IncrementalDigest for Md5 {
    fn absorb(&mut self, bytes: &[u8]) {
        self.0.consume(bytes);
    }

    fn finalize(self) -> Signature {
        Signature(self.0.compute().0)
    }
}
