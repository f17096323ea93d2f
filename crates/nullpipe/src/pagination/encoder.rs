use bstr::ByteSlice;
use tracing::{debug, trace};

use super::{MARKER, Tag, pending_prefix_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EncoderState {
    #[default]
    Fresh,
    Open,
    Closed,
}

/// Writer side of the pagination framing.
///
/// The encoder only tracks whether the start and end sequences were emitted;
/// payload handling is stateless, so handing it the same unconsumed remainder
/// twice yields the same bytes.
#[derive(Debug, Default)]
pub struct PageEncoder {
    state: EncoderState,
}

impl PageEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `null-page-s`. Only the first call writes anything.
    pub fn begin(&mut self, out: &mut Vec<u8>) {
        if self.state == EncoderState::Fresh {
            out.extend_from_slice(&Tag::Start.sequence());
            self.state = EncoderState::Open;
            debug!("wrote starting pagination");
        }
    }

    /// Escape `chunk` into `out` and return how many bytes of it were
    /// consumed.
    ///
    /// Every complete marker in `chunk` is followed by an injected `m`. If the
    /// chunk ends in a proper prefix of the marker and `last` is false, those
    /// bytes are withheld and the return value is short of `chunk.len()`; the
    /// caller passes them again in front of the next chunk.
    pub fn encode(&mut self, chunk: &[u8], last: bool, out: &mut Vec<u8>) -> usize {
        debug_assert_eq!(self.state, EncoderState::Open, "encode outside of begin/finish");

        let mut pos = 0;
        while let Some(found) = chunk[pos..].find(MARKER) {
            let after = pos + found + MARKER.len();
            out.extend_from_slice(&chunk[pos..after]);
            out.push(Tag::Mid.byte());
            trace!(bytes = after - pos, "wrote paged chars with mid pagination");
            pos = after;
        }

        let rest = &chunk[pos..];
        let held = if last { 0 } else { pending_prefix_len(rest) };
        out.extend_from_slice(&rest[..rest.len() - held]);
        if held > 0 {
            trace!(held, "withholding marker prefix");
        }
        chunk.len() - held
    }

    /// Emit `null-page-e`. Only the first call after [`begin`](Self::begin)
    /// writes anything.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.state == EncoderState::Open {
            out.extend_from_slice(&Tag::End.sequence());
            self.state = EncoderState::Closed;
            debug!("wrote ending pagination");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (PageEncoder, Vec<u8>) {
        let mut encoder = PageEncoder::new();
        let mut out = Vec::new();
        encoder.begin(&mut out);
        out.clear();
        (encoder, out)
    }

    #[test]
    fn plain_bytes_pass_through() {
        let (mut encoder, mut out) = open();
        assert_eq!(encoder.encode(b"hello", false, &mut out), 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn marker_gets_mid_tag() {
        let (mut encoder, mut out) = open();
        assert_eq!(encoder.encode(b"null-page-", false, &mut out), 10);
        assert_eq!(out, b"null-page-m");
    }

    #[test]
    fn marker_prefix_is_withheld_until_last() {
        let (mut encoder, mut out) = open();
        assert_eq!(encoder.encode(b"abnull-p", false, &mut out), 2);
        assert_eq!(out, b"ab");

        out.clear();
        assert_eq!(encoder.encode(b"null-p", true, &mut out), 6);
        assert_eq!(out, b"null-p");
    }

    #[test]
    fn repeated_calls_on_remainder_are_stable() {
        let (mut encoder, mut first) = open();
        let used = encoder.encode(b"xnull-pag", false, &mut first);
        let mut second = Vec::new();
        let again = encoder.encode(b"xnull-pag", false, &mut second);
        assert_eq!((used, &first), (again, &second));
    }

    #[test]
    fn framing_is_emitted_once() {
        let mut encoder = PageEncoder::new();
        let mut out = Vec::new();
        encoder.begin(&mut out);
        encoder.begin(&mut out);
        encoder.encode(b"ab", true, &mut out);
        encoder.finish(&mut out);
        encoder.finish(&mut out);
        assert_eq!(out, b"null-page-sabnull-page-e");
    }
}
