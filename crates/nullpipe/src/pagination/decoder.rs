use bstr::{BStr, ByteSlice};
use tracing::{debug, trace};

use super::{ESCAPE_LEN, MARKER, Tag, pending_prefix_len};
use crate::PaginationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    NotStarted,
    Started,
    /// Terminal. All further input is discarded.
    Ended,
}

/// Outcome of one [`PageDecoder::decode`] call, relative to the window passed
/// in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes at the head of the window that are validated payload.
    pub safe: usize,
    /// Logical length of the window after escape bytes were removed. Bytes
    /// past this point are stale and must be truncated by the caller.
    pub len: usize,
}

/// Incremental reader for paginated streams.
///
/// The decoder is handed the not-yet-validated region of the read buffer on
/// every call. It rewrites that region in place, deleting start/mid escape
/// bytes, and reports how much of it is payload. Unvalidated bytes (a marker
/// prefix at the tail, or a marker whose tag has not arrived) stay at the tail
/// of the returned length and must be passed again, followed by new input, on
/// the next call.
#[derive(Debug, Default)]
pub struct PageDecoder {
    state: DecoderState,
}

impl PageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == DecoderState::Ended
    }

    /// Validate and unescape `window`.
    ///
    /// `last` signals that no further input will follow.
    ///
    /// # Errors
    ///
    /// - [`PaginationError::MissingStart`] once the window disagrees with
    ///   `null-page-s`, or input ends before it completes.
    /// - [`PaginationError::InvalidTag`] for a marker followed by anything but
    ///   `m` or `e`.
    /// - [`PaginationError::MissingEnd`] when `last` is set and `null-page-e`
    ///   has not been seen.
    pub fn decode(&mut self, window: &mut [u8], last: bool) -> Result<Decoded, PaginationError> {
        let mut end = window.len();

        match self.state {
            DecoderState::Ended => {
                if end > 0 {
                    trace!(bytes = end, "trimmed paged end chars");
                }
                return Ok(Decoded { safe: 0, len: 0 });
            }
            DecoderState::NotStarted => {
                let start = Tag::Start.sequence();
                let seen = end.min(ESCAPE_LEN);
                if window[..seen] != start[..seen] {
                    return Err(PaginationError::MissingStart);
                }
                if end < ESCAPE_LEN {
                    if last {
                        return Err(PaginationError::MissingStart);
                    }
                    return Ok(Decoded { safe: 0, len: end });
                }
                window.copy_within(ESCAPE_LEN.., 0);
                end -= ESCAPE_LEN;
                self.state = DecoderState::Started;
                debug!("trimmed {ESCAPE_LEN} bytes of starting pagination");
            }
            DecoderState::Started => {}
        }

        let mut pos = 0;
        let mut awaiting_tag = None;
        while let Some(found) = window[pos..end].find(MARKER) {
            let at = pos + found;
            let tag_at = at + MARKER.len();
            if tag_at == end {
                awaiting_tag = Some(at);
                break;
            }
            match Tag::from_byte(window[tag_at]) {
                Some(Tag::Mid) => {
                    window.copy_within(tag_at + 1..end, tag_at);
                    end -= 1;
                    pos = tag_at;
                    trace!("trimmed 1 byte of mid pagination");
                }
                Some(Tag::End) => {
                    self.state = DecoderState::Ended;
                    debug!(
                        discarded = end - tag_at - 1,
                        "trimmed {ESCAPE_LEN} bytes of end pagination"
                    );
                    return Ok(Decoded { safe: at, len: at });
                }
                Some(Tag::Start) | None => {
                    trace!(window = ?BStr::new(&window[at..=tag_at]), "bad escape");
                    return Err(PaginationError::InvalidTag(window[tag_at]));
                }
            }
        }

        if last {
            return Err(PaginationError::MissingEnd);
        }

        let safe = awaiting_tag.unwrap_or_else(|| end - pending_prefix_len(&window[pos..end]));
        Ok(Decoded { safe, len: end })
    }
}
