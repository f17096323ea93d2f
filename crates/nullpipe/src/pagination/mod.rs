//! In-band pagination framing.
//!
//! Overview
//! - A paginated stream is bracketed by two escape sequences so a reader can
//!   tell a complete stream from a truncated one without any out-of-band
//!   length. Every escape sequence is the marker [`MARKER`] (`null-page-`)
//!   followed by exactly one [`Tag`] byte.
//! - `null-page-s` appears exactly once, before the first payload byte.
//! - `null-page-e` appears exactly once, after the last payload byte. Nothing
//!   may legally follow it.
//! - A marker that occurs inside the payload is byte-stuffed as `null-page-m`.
//!   The reader drops the injected `m` and keeps the marker bytes.
//!
//! Chunk boundaries
//! - Both directions work on arbitrary chunks. A marker may be split across
//!   two writes (encoder) or two reads (decoder), so each side withholds a
//!   trailing proper prefix of the marker until the next chunk shows whether
//!   it completes.
//! - The marker has no proper suffix that is also a proper prefix, so a left to
//!   right scan that resumes right after a matched marker never misses an
//!   overlapping occurrence.
//!
//! ```text
//! payload:  ab null-page- cd
//! wire:     null-page-s ab null-page-m cd null-page-e
//! ```

mod decoder;
mod encoder;

pub use decoder::{Decoded, DecoderState, PageDecoder};
pub use encoder::PageEncoder;

/// Marker bytes that introduce every escape sequence.
pub const MARKER: &[u8] = b"null-page-";

/// Length of a full escape sequence: marker plus tag.
pub const ESCAPE_LEN: usize = MARKER.len() + 1;

/// Tag byte following [`MARKER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Start of the logical stream.
    Start,
    /// The marker occurred in the payload itself.
    Mid,
    /// End of the logical stream.
    End,
}

impl Tag {
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Tag::Start => b's',
            Tag::Mid => b'm',
            Tag::End => b'e',
        }
    }

    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            b's' => Some(Tag::Start),
            b'm' => Some(Tag::Mid),
            b'e' => Some(Tag::End),
            _ => None,
        }
    }

    /// The full escape sequence for this tag.
    #[must_use]
    pub fn sequence(self) -> [u8; ESCAPE_LEN] {
        let mut seq = [0u8; ESCAPE_LEN];
        seq[..MARKER.len()].copy_from_slice(MARKER);
        seq[MARKER.len()] = self.byte();
        seq
    }
}

/// Length of the longest suffix of `tail` that is a proper prefix of
/// [`MARKER`].
///
/// Those bytes cannot be classified until more input shows whether the marker
/// completes.
pub(crate) fn pending_prefix_len(tail: &[u8]) -> usize {
    let longest = tail.len().min(MARKER.len() - 1);
    (1..=longest)
        .rev()
        .find(|&k| tail.ends_with(&MARKER[..k]))
        .unwrap_or(0)
}

/// Encode a whole payload, fed to the encoder as the given chunks.
///
/// Convenience for tests and tools; the pump drives [`PageEncoder`] directly.
#[must_use]
pub fn encode_chunks<'a, I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut encoder = PageEncoder::new();
    let mut out = Vec::new();
    let mut carry = Vec::new();
    encoder.begin(&mut out);
    for chunk in chunks {
        carry.extend_from_slice(chunk);
        let used = encoder.encode(&carry, false, &mut out);
        carry.drain(..used);
    }
    let used = encoder.encode(&carry, true, &mut out);
    debug_assert_eq!(used, carry.len());
    encoder.finish(&mut out);
    out
}

/// Decode a framed stream delivered as the given chunks.
///
/// Mirrors how the pump keeps unvalidated bytes at the buffer tail between
/// reads.
///
/// # Errors
///
/// Returns the first structural error the decoder reports.
pub fn decode_chunks<'a, I>(chunks: I) -> Result<Vec<u8>, crate::PaginationError>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut decoder = PageDecoder::new();
    let mut pending = Vec::new();
    let mut payload = Vec::new();
    for chunk in chunks {
        pending.extend_from_slice(chunk);
        drain_decoded(&mut decoder, &mut pending, &mut payload, false)?;
    }
    drain_decoded(&mut decoder, &mut pending, &mut payload, true)?;
    Ok(payload)
}

fn drain_decoded(
    decoder: &mut PageDecoder,
    pending: &mut Vec<u8>,
    payload: &mut Vec<u8>,
    last: bool,
) -> Result<(), crate::PaginationError> {
    let Decoded { safe, len } = decoder.decode(pending, last)?;
    pending.truncate(len);
    payload.extend(pending.drain(..safe));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for tag in [Tag::Start, Tag::Mid, Tag::End] {
            assert_eq!(Tag::from_byte(tag.byte()), Some(tag));
        }
        assert_eq!(Tag::from_byte(b'x'), None);
    }

    #[test]
    fn sequence_layout() {
        assert_eq!(&Tag::End.sequence(), b"null-page-e");
    }

    #[test]
    fn pending_prefix_only_counts_proper_prefixes() {
        assert_eq!(pending_prefix_len(b""), 0);
        assert_eq!(pending_prefix_len(b"abc"), 0);
        assert_eq!(pending_prefix_len(b"abn"), 1);
        assert_eq!(pending_prefix_len(b"xnull-pag"), 8);
        assert_eq!(pending_prefix_len(b"null-page"), 9);
        // A complete marker is never pending.
        assert_eq!(pending_prefix_len(b"null-page-"), 0);
        assert_eq!(pending_prefix_len(b"null-"), 5);
    }

    #[quickcheck_macros::quickcheck]
    fn pending_prefix_is_a_proper_marker_prefix(tail: Vec<u8>) -> bool {
        let k = pending_prefix_len(&tail);
        k < MARKER.len() && tail.ends_with(&MARKER[..k])
    }
}
