//! Byte-safe log truncation.
//!
//! CI errors cluster near the end of a log, so truncation keeps the tail.
//! The cut point never lands inside a multi-byte UTF-8 sequence.

use tracing::debug;

/// Truncate `text` to at most `max_bytes` UTF-8 bytes, keeping the tail.
///
/// The returned slice is a suffix of `text`; when the byte budget would cut
/// a multi-byte character, the start advances past the continuation bytes so
/// the result is always valid UTF-8 of length <= `max_bytes`. Input that
/// already fits is returned unchanged.
pub fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut start = text.len() - max_bytes;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }

    debug!(
        original_bytes = text.len(),
        kept_bytes = text.len() - start,
        max_bytes,
        "log exceeded byte budget; kept the tail"
    );
    &text[start..]
}
