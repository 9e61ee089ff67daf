//! Partition renderer.
//!
//! # Responsibility
//! - Turn canonical text plus a scope's annotations into an ordered,
//!   gap-free segment sequence that a presentation surface can render.
//!
//! # Invariants
//! - Concatenating segment texts in order reproduces the content exactly.
//! - The result is never empty; no annotations yields one plain segment.
//! - Segment offsets are char offsets and are strictly contiguous.
//! - The function is total: out-of-bounds spans and spans that start inside
//!   an earlier one are skipped (logged) instead of corrupting the output.

use crate::model::annotation::Annotation;
use crate::model::text::char_len;
use log::warn;
use serde::Serialize;

/// One contiguous slice of canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment<'a> {
    Plain {
        start: usize,
        end: usize,
        text: &'a str,
    },
    Annotated {
        start: usize,
        end: usize,
        text: &'a str,
        annotation: &'a Annotation,
    },
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Self::Plain { text, .. } | Self::Annotated { text, .. } => text,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            Self::Plain { start, .. } | Self::Annotated { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Self::Plain { end, .. } | Self::Annotated { end, .. } => *end,
        }
    }

    /// Width in chars.
    pub fn char_len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn annotation(&self) -> Option<&'a Annotation> {
        match self {
            Self::Plain { .. } => None,
            Self::Annotated { annotation, .. } => Some(annotation),
        }
    }

    pub fn is_annotated(&self) -> bool {
        matches!(self, Self::Annotated { .. })
    }
}

/// Splits `content` into plain and annotated segments.
///
/// Annotations may be passed in any order.
pub fn partition<'a>(content: &'a str, annotations: &'a [Annotation]) -> Vec<Segment<'a>> {
    let total_chars = char_len(content);
    let mut ordered: Vec<&Annotation> = annotations.iter().collect();
    ordered.sort_by_key(|item| (item.span, item.id));

    let mut segments = Vec::with_capacity(ordered.len() * 2 + 1);
    let mut cursor = TextCursor::new(content);

    for annotation in ordered {
        let span = annotation.span;
        if span.end() > total_chars {
            warn!(
                "event=partition_skip module=engine status=rejected reason=out_of_bounds annotation_id={} end={} content_len={}",
                annotation.id,
                span.end(),
                total_chars
            );
            continue;
        }
        if span.start() < cursor.chars {
            warn!(
                "event=partition_skip module=engine status=rejected reason=overlap annotation_id={} start={} cursor={}",
                annotation.id,
                span.start(),
                cursor.chars
            );
            continue;
        }

        if span.start() > cursor.chars {
            let start = cursor.chars;
            let text = cursor.advance_to(span.start());
            segments.push(Segment::Plain {
                start,
                end: span.start(),
                text,
            });
        }
        let text = cursor.advance_to(span.end());
        segments.push(Segment::Annotated {
            start: span.start(),
            end: span.end(),
            text,
            annotation,
        });
    }

    if cursor.chars < total_chars || segments.is_empty() {
        let start = cursor.chars;
        let text = cursor.advance_to(total_chars);
        segments.push(Segment::Plain {
            start,
            end: total_chars,
            text,
        });
    }

    segments
}

/// Concatenates segment texts in order.
pub fn concat_segments(segments: &[Segment<'_>]) -> String {
    segments.iter().map(Segment::text).collect()
}

/// Forward-only walker translating char offsets into byte slices.
struct TextCursor<'a> {
    content: &'a str,
    chars: usize,
    bytes: usize,
}

impl<'a> TextCursor<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            content,
            chars: 0,
            bytes: 0,
        }
    }

    /// Moves to `target` chars and returns the text passed over.
    ///
    /// Callers guarantee `self.chars <= target <= char_len(content)`.
    fn advance_to(&mut self, target: usize) -> &'a str {
        let rest = &self.content[self.bytes..];
        let step = target - self.chars;
        let byte_len = rest
            .char_indices()
            .nth(step)
            .map_or(rest.len(), |(idx, _)| idx);
        let text = &rest[..byte_len];
        self.bytes += byte_len;
        self.chars = target;
        text
    }
}
