//! Char-offset helpers over canonical text.
//!
//! # Responsibility
//! - Measure and slice canonical strings in Unicode scalar values.
//!
//! # Invariants
//! - Offsets passed to these helpers are char offsets, never byte offsets.
//! - Slicing never splits a code point; out-of-range input yields `None`.

use crate::model::annotation::Span;

/// Returns the number of chars in `content`.
pub fn char_len(content: &str) -> usize {
    content.chars().count()
}

/// Converts a char offset into a byte offset within `content`.
///
/// `char_offset == char_len(content)` maps to `content.len()`.
pub fn byte_offset(content: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    match content.char_indices().nth(char_offset) {
        Some((byte_idx, _)) => Some(byte_idx),
        None if char_len(content) == char_offset => Some(content.len()),
        None => None,
    }
}

/// Returns `content[start..end]` measured in chars.
pub fn slice_chars(content: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let from = byte_offset(content, start)?;
    let to = byte_offset(content, end)?;
    content.get(from..to)
}

/// Returns the text covered by `span`, or `None` if it exceeds `content`.
pub fn slice_span(content: &str, span: Span) -> Option<&str> {
    slice_chars(content, span.start(), span.end())
}

#[cfg(test)]
mod tests {
    use super::{byte_offset, char_len, slice_chars};

    #[test]
    fn slice_chars_handles_multibyte_text() {
        let content = "naïve café";
        assert_eq!(char_len(content), 10);
        assert_eq!(slice_chars(content, 6, 10), Some("café"));
        assert_eq!(slice_chars(content, 0, 5), Some("naïve"));
    }

    #[test]
    fn byte_offset_accepts_end_of_text_and_rejects_beyond() {
        assert_eq!(byte_offset("héllo", 5), Some(6));
        assert_eq!(byte_offset("héllo", 6), None);
        assert_eq!(byte_offset("", 0), Some(0));
    }

    #[test]
    fn slice_chars_rejects_reversed_range() {
        assert_eq!(slice_chars("abc", 2, 1), None);
    }
}
