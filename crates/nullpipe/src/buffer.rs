use crate::PumpError;

/// Growable read-ahead buffer owned by the pump.
///
/// Bytes are appended at the tail and released from the head. Releasing only
/// moves the head index; the unreleased bytes are shifted back to offset zero
/// before the next read so the free space is always one contiguous tail.
/// Callers only ever see the logical view [`as_slice`](Self::as_slice), which
/// starts at the oldest unreleased byte.
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    data: Vec<u8>,
    head: usize,
    tail: usize,
}

impl ReadBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, PumpError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PumpError::Alloc { bytes: capacity })?;
        data.resize(capacity, 0);
        Ok(Self {
            data,
            head: 0,
            tail: 0,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.tail - self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data[self.head..self.tail]
    }

    /// Unreleased bytes from `from` onwards, for in-place rewriting.
    pub(crate) fn tail_from_mut(&mut self, from: usize) -> &mut [u8] {
        &mut self.data[self.head + from..self.tail]
    }

    /// Free space at the tail, at most `max` bytes long.
    ///
    /// Compacts first, so the returned slice covers all free space.
    pub(crate) fn spare_mut(&mut self, max: usize) -> &mut [u8] {
        self.compact();
        let end = self.data.len().min(self.tail.saturating_add(max));
        &mut self.data[self.tail..end]
    }

    /// Mark `n` bytes written into [`spare_mut`](Self::spare_mut) as filled.
    pub(crate) fn commit(&mut self, n: usize) {
        debug_assert!(self.tail + n <= self.data.len());
        self.tail += n;
    }

    /// Drop `n` bytes from the head.
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.head += n;
        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }
    }

    /// Shorten the logical length to `len`, discarding bytes after it.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.tail = self.head + len;
        }
    }

    /// Double the capacity.
    pub(crate) fn grow(&mut self) -> Result<(), PumpError> {
        let extra = self.capacity().max(1);
        let bytes = self.capacity() + extra;
        self.data
            .try_reserve_exact(extra)
            .map_err(|_| PumpError::Alloc { bytes })?;
        self.data.resize(bytes, 0);
        Ok(())
    }

    fn compact(&mut self) {
        if self.head > 0 {
            self.data.copy_within(self.head..self.tail, 0);
            self.tail -= self.head;
            self.head = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8], capacity: usize) -> ReadBuffer {
        let mut buf = ReadBuffer::with_capacity(capacity).unwrap();
        buf.spare_mut(bytes.len())[..bytes.len()].copy_from_slice(bytes);
        buf.commit(bytes.len());
        buf
    }

    #[test]
    fn consume_shifts_logical_view() {
        let mut buf = filled(b"abcdefgh", 16);
        buf.consume(3);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_slice(), b"defgh");
    }

    #[test]
    fn spare_compacts_and_reuses_space() {
        let mut buf = filled(b"abcdefgh", 8);
        assert!(buf.is_full());
        buf.consume(6);
        let spare = buf.spare_mut(usize::MAX);
        assert_eq!(spare.len(), 6);
        spare[..2].copy_from_slice(b"ij");
        buf.commit(2);
        assert_eq!(buf.as_slice(), b"ghij");
    }

    #[test]
    fn unbounded_spare_with_bytes_buffered() {
        let mut buf = filled(b"abc", 8);
        assert_eq!(buf.spare_mut(usize::MAX).len(), 5);
        buf.consume(1);
        assert_eq!(buf.spare_mut(usize::MAX).len(), 6);
        assert_eq!(buf.as_slice(), b"bc");
    }

    #[test]
    fn spare_respects_max() {
        let mut buf = filled(b"ab", 8);
        assert_eq!(buf.spare_mut(3).len(), 3);
    }

    #[test]
    fn consume_everything_resets() {
        let mut buf = filled(b"abc", 4);
        buf.consume(3);
        assert!(buf.is_empty());
        assert_eq!(buf.spare_mut(usize::MAX).len(), 4);
    }

    #[test]
    fn truncate_and_tail_rewrite() {
        let mut buf = filled(b"abXcd", 8);
        buf.consume(1);
        let tail = buf.tail_from_mut(1);
        tail.copy_within(1.., 0);
        buf.truncate(3);
        assert_eq!(buf.as_slice(), b"bcd");
    }

    #[test]
    fn grow_doubles() {
        let mut buf = filled(b"abcd", 4);
        buf.grow().unwrap();
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.as_slice(), b"abcd");
        assert!(!buf.is_full());
    }
}
