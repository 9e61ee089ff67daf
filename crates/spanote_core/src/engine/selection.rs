//! Selection mapper.
//!
//! # Responsibility
//! - Translate a selection made against rendered segments into canonical
//!   `[start, end)` char offsets.
//!
//! # Invariants
//! - Rendered segment texts concatenate to the canonical content, so the
//!   canonical offset of a point is the rendered char count before it,
//!   regardless of how the text was wrapped into segments.
//! - On success `content[start..end] == text` (char offsets).
//! - Collapsed selections and points outside the rendered root map to `None`.

use crate::engine::partition::Segment;
use crate::model::annotation::Span;
use crate::model::text::{char_len, slice_chars};
use serde::{Deserialize, Serialize};

/// A caret position inside the rendered output.
///
/// `offset` counts chars inside segment number `segment`, like a DOM
/// `(text node, offset)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionPoint {
    pub segment: usize,
    pub offset: usize,
}

impl SelectionPoint {
    pub fn new(segment: usize, offset: usize) -> Self {
        Self { segment, offset }
    }
}

/// Raw selection as reported by the presentation surface.
///
/// `focus` may precede `anchor` for backward selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl SelectionRange {
    pub fn new(anchor: SelectionPoint, focus: SelectionPoint) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Selection resolved against canonical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedSelection {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl MappedSelection {
    /// The selection as a span; `None` only for an empty selection.
    pub fn span(&self) -> Option<Span> {
        Span::new(self.start, self.end).ok()
    }
}

/// Maps a rendered selection to canonical offsets.
pub fn map_selection(rendered: &[Segment<'_>], range: &SelectionRange) -> Option<MappedSelection> {
    if range.is_collapsed() {
        return None;
    }
    let anchor = measure(rendered, range.anchor)?;
    let focus = measure(rendered, range.focus)?;
    let (first, last) = if anchor <= focus {
        (range.anchor, range.focus)
    } else {
        (range.focus, range.anchor)
    };
    let start = anchor.min(focus);

    let text = selected_text(rendered, first, last);
    if text.is_empty() {
        return None;
    }
    let end = start + char_len(&text);
    Some(MappedSelection { text, start, end })
}

/// Maps raw canonical offsets reported directly by a surface.
pub fn map_offsets(content: &str, start: usize, end: usize) -> Option<MappedSelection> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    if start == end {
        return None;
    }
    let text = slice_chars(content, start, end)?;
    Some(MappedSelection {
        text: text.to_string(),
        start,
        end,
    })
}

/// Rendered char count preceding `point`, or `None` outside the root.
fn measure(rendered: &[Segment<'_>], point: SelectionPoint) -> Option<usize> {
    let segment = rendered.get(point.segment)?;
    if point.offset > char_len(segment.text()) {
        return None;
    }
    let preceding: usize = rendered[..point.segment]
        .iter()
        .map(|segment| char_len(segment.text()))
        .sum();
    Some(preceding + point.offset)
}

/// Concatenates rendered text between two ordered, validated points.
fn selected_text(rendered: &[Segment<'_>], first: SelectionPoint, last: SelectionPoint) -> String {
    let mut text = String::new();
    for (idx, segment) in rendered
        .iter()
        .enumerate()
        .take(last.segment + 1)
        .skip(first.segment)
    {
        let segment_text = segment.text();
        let from = if idx == first.segment { first.offset } else { 0 };
        let to = if idx == last.segment {
            last.offset
        } else {
            char_len(segment_text)
        };
        if let Some(piece) = slice_chars(segment_text, from, to) {
            text.push_str(piece);
        }
    }
    text
}
