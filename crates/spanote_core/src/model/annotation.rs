//! Annotation domain model.
//!
//! # Responsibility
//! - Define the scope, span and annotation records shared by every layer.
//! - Provide construction-time validation before anything reaches storage.
//!
//! # Invariants
//! - A `Span` is always non-empty and half-open: `start < end`.
//! - `highlighted_text` has exactly `span.len()` chars.
//! - `note` is never blank.
//! - Offsets and `highlighted_text` are immutable after creation; only
//!   `note` changes.

use crate::model::text::{char_len, slice_span};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier assigned by storage on create.
pub type AnnotationId = Uuid;

/// Owning record and field that annotations are partitioned by.
///
/// Non-overlap is enforced within one scope only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Owning record id, e.g. one experiment run.
    pub record_id: String,
    /// Field name within the record, e.g. `output` or `recommendation-2`.
    pub field: String,
}

impl Scope {
    pub fn new(record_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            field: field.into(),
        }
    }

    /// Returns whether both parts are non-blank.
    pub fn is_valid(&self) -> bool {
        !self.record_id.trim().is_empty() && !self.field.trim().is_empty()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.record_id, self.field)
    }
}

/// Span construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanError {
    /// `start >= end`.
    Empty { start: usize, end: usize },
    /// `end` lies beyond the canonical text.
    OutOfBounds { end: usize, content_len: usize },
}

impl Display for SpanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { start, end } => {
                write!(f, "span must be non-empty: start={start} end={end}")
            }
            Self::OutOfBounds { end, content_len } => write!(
                f,
                "span end {end} is beyond content length {content_len}"
            ),
        }
    }
}

impl Error for SpanError {}

#[derive(Deserialize)]
struct SpanRepr {
    start_offset: usize,
    end_offset: usize,
}

impl TryFrom<SpanRepr> for Span {
    type Error = SpanError;

    fn try_from(value: SpanRepr) -> Result<Self, Self::Error> {
        Span::new(value.start_offset, value.end_offset)
    }
}

/// Half-open char interval `[start, end)` over canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SpanRepr")]
pub struct Span {
    #[serde(rename = "start_offset")]
    start: usize,
    #[serde(rename = "end_offset")]
    end: usize,
}

impl Span {
    /// Creates a span, rejecting empty or reversed intervals.
    pub fn new(start: usize, end: usize) -> Result<Self, SpanError> {
        if start >= end {
            return Err(SpanError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(self) -> usize {
        self.start
    }

    pub fn end(self) -> usize {
        self.end
    }

    /// Number of chars covered.
    pub fn len(self) -> usize {
        self.end - self.start
    }

    /// Always `false`; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(self) -> bool {
        false
    }

    /// Strict interior overlap. Touching boundaries do not overlap.
    pub fn overlaps(self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// One span ends exactly where the other starts.
    pub fn touches(self, other: Span) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// Rejects spans that end beyond `content_len` chars.
    pub fn check_within(self, content_len: usize) -> Result<(), SpanError> {
        if self.end > content_len {
            return Err(SpanError::OutOfBounds {
                end: self.end,
                content_len,
            });
        }
        Ok(())
    }
}

/// Returns whether two annotations' intervals intersect.
pub fn overlaps(a: &Annotation, b: &Annotation) -> bool {
    a.span.overlaps(b.span)
}

/// Validation errors raised before an annotation reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValidationError {
    /// Record id or field name is blank.
    InvalidScope(Scope),
    Span(SpanError),
    /// Stored text length disagrees with the span width.
    HighlightLengthMismatch { span_len: usize, text_len: usize },
    /// Stored text disagrees with the canonical text under the span.
    HighlightMismatch { span: Span },
    /// Note is blank after trim.
    EmptyNote,
}

impl Display for AnnotationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidScope(scope) => write!(f, "invalid annotation scope: `{scope}`"),
            Self::Span(err) => write!(f, "{err}"),
            Self::HighlightLengthMismatch { span_len, text_len } => write!(
                f,
                "highlighted text has {text_len} chars but span covers {span_len}"
            ),
            Self::HighlightMismatch { span } => write!(
                f,
                "highlighted text does not match content at [{}, {})",
                span.start(),
                span.end()
            ),
            Self::EmptyNote => write!(f, "annotation note must not be blank"),
        }
    }
}

impl Error for AnnotationValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Span(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SpanError> for AnnotationValidationError {
    fn from(value: SpanError) -> Self {
        Self::Span(value)
    }
}

/// Trims a note and rejects blank input.
pub fn normalize_note(note: &str) -> Option<String> {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Persisted note attached to one span of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub scope: Scope,
    #[serde(flatten)]
    pub span: Span,
    /// Copy of the canonical text under `span` at creation time.
    pub highlighted_text: String,
    pub note: String,
    /// Attribution only; not a permission boundary.
    pub author: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Annotation {
    /// Checks record-local invariants.
    pub fn validate(&self) -> Result<(), AnnotationValidationError> {
        validate_parts(&self.scope, self.span, &self.highlighted_text, &self.note)
    }

    /// Checks bounds and highlighted text against the canonical text.
    pub fn validate_against(&self, content: &str) -> Result<(), AnnotationValidationError> {
        self.validate()?;
        check_against_content(self.span, &self.highlighted_text, content)
    }

    /// Whitespace-collapsed highlighted text capped at `max_chars`.
    pub fn preview(&self, max_chars: usize) -> String {
        let collapsed = WHITESPACE_RE.replace_all(self.highlighted_text.trim(), " ");
        let mut preview = collapsed.chars().take(max_chars).collect::<String>();
        if collapsed.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// Create request for one annotation; storage assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    pub scope: Scope,
    #[serde(flatten)]
    pub span: Span,
    pub highlighted_text: String,
    pub note: String,
    pub author: Option<String>,
}

impl AnnotationDraft {
    pub fn new(
        scope: Scope,
        span: Span,
        highlighted_text: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            span,
            highlighted_text: highlighted_text.into(),
            note: note.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn validate(&self) -> Result<(), AnnotationValidationError> {
        validate_parts(&self.scope, self.span, &self.highlighted_text, &self.note)
    }

    pub fn validate_against(&self, content: &str) -> Result<(), AnnotationValidationError> {
        self.validate()?;
        check_against_content(self.span, &self.highlighted_text, content)
    }
}

fn validate_parts(
    scope: &Scope,
    span: Span,
    highlighted_text: &str,
    note: &str,
) -> Result<(), AnnotationValidationError> {
    if !scope.is_valid() {
        return Err(AnnotationValidationError::InvalidScope(scope.clone()));
    }
    let text_len = char_len(highlighted_text);
    if text_len != span.len() {
        return Err(AnnotationValidationError::HighlightLengthMismatch {
            span_len: span.len(),
            text_len,
        });
    }
    if note.trim().is_empty() {
        return Err(AnnotationValidationError::EmptyNote);
    }
    Ok(())
}

fn check_against_content(
    span: Span,
    highlighted_text: &str,
    content: &str,
) -> Result<(), AnnotationValidationError> {
    span.check_within(char_len(content))?;
    match slice_span(content, span) {
        Some(actual) if actual == highlighted_text => Ok(()),
        _ => Err(AnnotationValidationError::HighlightMismatch { span }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end).unwrap()
    }

    #[test]
    fn span_rejects_empty_and_reversed_intervals() {
        assert_eq!(
            Span::new(3, 3),
            Err(SpanError::Empty { start: 3, end: 3 })
        );
        assert!(Span::new(5, 2).is_err());
    }

    #[test]
    fn touching_spans_do_not_overlap() {
        assert!(!span(0, 4).overlaps(span(4, 9)));
        assert!(span(0, 4).touches(span(4, 9)));
        assert!(span(0, 5).overlaps(span(4, 9)));
        assert!(span(2, 3).overlaps(span(0, 10)));
    }

    #[test]
    fn check_within_rejects_end_beyond_content() {
        assert!(span(20, 27).check_within(27).is_ok());
        assert_eq!(
            span(20, 28).check_within(27),
            Err(SpanError::OutOfBounds {
                end: 28,
                content_len: 27
            })
        );
    }

    #[test]
    fn draft_validation_checks_text_length_and_note() {
        let scope = Scope::new("run-1", "output");
        let ok = AnnotationDraft::new(scope.clone(), span(4, 9), "quick", "speed");
        assert!(ok.validate().is_ok());

        let short = AnnotationDraft::new(scope.clone(), span(4, 9), "quic", "speed");
        assert!(matches!(
            short.validate(),
            Err(AnnotationValidationError::HighlightLengthMismatch { .. })
        ));

        let blank = AnnotationDraft::new(scope, span(4, 9), "quick", "  \n");
        assert_eq!(blank.validate(), Err(AnnotationValidationError::EmptyNote));
    }

    #[test]
    fn draft_validate_against_detects_mismatched_text() {
        let content = "The quick brown fox jumps.";
        let scope = Scope::new("run-1", "output");
        let draft = AnnotationDraft::new(scope, span(4, 9), "brown", "color");
        assert!(matches!(
            draft.validate_against(content),
            Err(AnnotationValidationError::HighlightMismatch { .. })
        ));
    }

    #[test]
    fn blank_scope_is_rejected() {
        let draft = AnnotationDraft::new(Scope::new(" ", "output"), span(0, 1), "T", "n");
        assert!(matches!(
            draft.validate(),
            Err(AnnotationValidationError::InvalidScope(_))
        ));
    }

    #[test]
    fn span_deserialization_enforces_non_empty_interval() {
        let parsed: Span = serde_json::from_str(r#"{"start_offset":1,"end_offset":4}"#).unwrap();
        assert_eq!(parsed, span(1, 4));
        assert!(serde_json::from_str::<Span>(r#"{"start_offset":4,"end_offset":4}"#).is_err());
    }

    #[test]
    fn preview_collapses_whitespace_and_truncates() {
        let annotation = Annotation {
            id: Uuid::new_v4(),
            scope: Scope::new("run-1", "output"),
            span: span(0, 13),
            highlighted_text: "alpha\n\n beta ".to_string(),
            note: "n".to_string(),
            author: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(annotation.preview(40), "alpha beta");
        assert_eq!(annotation.preview(3), "alp...");
    }

    #[test]
    fn normalize_note_trims_and_rejects_blank() {
        assert_eq!(normalize_note("  keep  ").as_deref(), Some("keep"));
        assert_eq!(normalize_note("\t"), None);
    }
}
