//! Core annotation engine for spanote.
//! Notes are attached to exact char spans of immutable field text; this
//! crate is the single source of truth for their invariants.

pub mod content;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use content::{format_content, ContentError, ContentKind, ContentSource, MemoryContentSource};
pub use engine::overlap::{can_insert, find_conflicts};
pub use engine::partition::{concat_segments, partition, Segment};
pub use engine::selection::{
    map_offsets, map_selection, MappedSelection, SelectionPoint, SelectionRange,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::annotation::{
    overlaps, Annotation, AnnotationDraft, AnnotationId, AnnotationValidationError, Scope, Span,
    SpanError,
};
pub use model::annotation_set::AnnotationSet;
pub use repo::annotation_repo::{
    AnnotationRepository, RepoError, RepoResult, SqliteAnnotationRepository,
};
pub use service::annotation_service::{AnnotationService, AnnotationServiceError};
pub use service::scope_session::{
    Candidate, IntegrityIssue, RejectReason, ScopeSession, SelectionOutcome, SelectionState,
};
pub use sync::events::{AnnotationEvent, MergeOutcome};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
