//! Maps a character offset in the published status line back to a segment.
//!
//! Offsets count UTF-8 characters, not bytes, because that is what a bar
//! click reports. The status line is raw bytes: segment output is captured
//! byte-wise and the output cap can cut a multi-byte sequence in half, so
//! invalid UTF-8 is a reachable input here, not a programming error.

/// Maximum length of a UTF-8 sequence in bytes.
const UTF_MAX: usize = 4;

/// Where a character offset in the status line landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// Offset falls inside this segment's text span.
    Segment(usize),
    /// Offset falls on a delimiter run; not attributable to any segment.
    Delimiter,
    /// A byte before the offset is not a valid UTF-8 leading byte.
    InvalidUtf8,
    /// The status line ends before the offset is reached.
    OutOfRange,
}

/// Byte length of the UTF-8 sequence introduced by leading byte `b`, or
/// `None` for continuation bytes and other invalid leading bytes.
fn utf8_sequence_len(b: u8) -> Option<usize> {
    match b {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

/// Resolves the zero-based character offset `char_offset` in `status` to a
/// segment index.
///
/// Walks the status line once, one code point (or one delimiter run) at a
/// time. A delimiter run counts as a single unit of the delimiter's own
/// character length; the segment index is the number of delimiter runs
/// consumed before the offset. Pure and deterministic.
pub fn segment_from_offset(status: &[u8], delimiter: &str, char_offset: usize) -> ClickTarget {
    debug_assert!(!delimiter.is_empty());
    let delim_bytes = delimiter.as_bytes();
    let delim_chars = delimiter.chars().count();

    let mut pos = 0; // byte position in status
    let mut chars = 0; // running character count
    let mut delims = 0; // delimiter runs consumed so far

    while pos < status.len() {
        if status[pos..].starts_with(delim_bytes) {
            chars += delim_chars;
            if chars > char_offset {
                return ClickTarget::Delimiter;
            }
            delims += 1;
            pos += delim_bytes.len();
        } else {
            if chars >= char_offset {
                return ClickTarget::Segment(delims);
            }
            match utf8_sequence_len(status[pos]) {
                Some(len) if pos + len <= status.len() => pos += len,
                // Invalid leading byte, or a sequence truncated by the
                // output cap.
                _ => return ClickTarget::InvalidUtf8,
            }
            chars += 1;
        }
    }
    ClickTarget::OutOfRange
}
