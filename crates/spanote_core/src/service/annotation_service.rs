//! Annotation use-case service.
//!
//! # Responsibility
//! - Validate create/update requests before they reach storage.
//! - Translate repository failures into the user-facing error taxonomy.
//! - Emit metadata-only diagnostics for every mutation.
//!
//! # Invariants
//! - A create request must match the canonical text it was selected from.
//! - Blank notes never cause a storage round-trip.
//! - Note and highlighted text bodies are never logged.

use crate::content::ContentError;
use crate::engine::selection::MappedSelection;
use crate::model::annotation::{
    normalize_note, Annotation, AnnotationDraft, AnnotationId, AnnotationValidationError, Scope,
    SpanError,
};
use crate::model::annotation_set::AnnotationSet;
use crate::repo::annotation_repo::{AnnotationRepository, RepoError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for annotation use-cases.
#[derive(Debug)]
pub enum AnnotationServiceError {
    /// Selection is empty, out of bounds, or disagrees with the content.
    InvalidSelection(AnnotationValidationError),
    /// Record id or field name is blank.
    InvalidScope(Scope),
    /// Candidate span intersects stored annotations.
    OverlapRejected { conflicting: Vec<AnnotationId> },
    /// Note is blank after trim.
    EmptyNote,
    /// Confirm was requested with no candidate pending.
    NoPendingCandidate,
    /// Target annotation does not exist or is deleted.
    AnnotationNotFound(AnnotationId),
    /// Canonical text could not be loaded.
    Content(ContentError),
    /// Persistence-layer failure; retryable.
    Persistence(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for AnnotationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSelection(err) => write!(f, "invalid selection: {err}"),
            Self::InvalidScope(scope) => write!(f, "invalid annotation scope: `{scope}`"),
            Self::OverlapRejected { conflicting } => write!(
                f,
                "selection overlaps {} existing annotation(s)",
                conflicting.len().max(1)
            ),
            Self::EmptyNote => write!(f, "annotation note must not be blank"),
            Self::NoPendingCandidate => write!(f, "no selection is pending confirmation"),
            Self::AnnotationNotFound(id) => write!(f, "annotation not found: {id}"),
            Self::Content(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent annotation state: {details}")
            }
        }
    }
}

impl Error for AnnotationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSelection(err) => Some(err),
            Self::Content(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AnnotationValidationError> for AnnotationServiceError {
    fn from(value: AnnotationValidationError) -> Self {
        match value {
            AnnotationValidationError::EmptyNote => Self::EmptyNote,
            AnnotationValidationError::InvalidScope(scope) => Self::InvalidScope(scope),
            other => Self::InvalidSelection(other),
        }
    }
}

impl From<RepoError> for AnnotationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::AnnotationNotFound(id),
            RepoError::Overlap { conflicting } => Self::OverlapRejected { conflicting },
            RepoError::Validation(err) => err.into(),
            other => Self::Persistence(other),
        }
    }
}

impl From<ContentError> for AnnotationServiceError {
    fn from(value: ContentError) -> Self {
        Self::Content(value)
    }
}

impl AnnotationServiceError {
    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSelection(_) => "invalid_selection",
            Self::InvalidScope(_) => "invalid_scope",
            Self::OverlapRejected { .. } => "overlap_rejected",
            Self::EmptyNote => "empty_note",
            Self::NoPendingCandidate => "no_pending_candidate",
            Self::AnnotationNotFound(_) => "annotation_not_found",
            Self::Content(_) => "content_unavailable",
            Self::Persistence(_) => "persistence_failed",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }

    /// Whether the failure is an expected user-level rejection rather than
    /// a storage fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Persistence(_) | Self::Content(_) | Self::InconsistentState(_)
        )
    }
}

/// Annotation service facade over repository implementations.
pub struct AnnotationService<R: AnnotationRepository> {
    repo: R,
}

impl<R: AnnotationRepository> AnnotationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Loads the active annotations of one scope.
    pub fn load_scope(&self, scope: &Scope) -> Result<AnnotationSet, AnnotationServiceError> {
        if !scope.is_valid() {
            return Err(AnnotationServiceError::InvalidScope(scope.clone()));
        }
        let items = self.repo.list_annotations(scope)?;
        Ok(AnnotationSet::from_annotations(scope.clone(), items))
    }

    /// Gets one active annotation by id.
    pub fn get_annotation(
        &self,
        id: AnnotationId,
    ) -> Result<Option<Annotation>, AnnotationServiceError> {
        Ok(self.repo.get_annotation(id)?)
    }

    /// Persists a note over a mapped selection of `content`.
    ///
    /// # Contract
    /// - `content` is the canonical text the selection was mapped against.
    /// - Storage re-checks overlap atomically; a concurrent writer that got
    ///   there first yields `OverlapRejected`.
    pub fn create_annotation(
        &mut self,
        scope: &Scope,
        content: &str,
        selection: &MappedSelection,
        note: &str,
        author: Option<&str>,
    ) -> Result<Annotation, AnnotationServiceError> {
        let started_at = Instant::now();
        let note = normalize_note(note).ok_or(AnnotationValidationError::EmptyNote)?;
        let span = selection.span().ok_or(AnnotationValidationError::Span(
            SpanError::Empty {
                start: selection.start,
                end: selection.end,
            },
        ))?;

        let mut draft = AnnotationDraft::new(scope.clone(), span, selection.text.clone(), note);
        draft.author = author.map(str::to_string);
        draft.validate_against(content)?;

        match self.repo.create_annotation(&draft) {
            Ok(created) if created.span != span || created.scope != *scope => Err(self.log_failure(
                "annotation_create",
                scope,
                started_at,
                AnnotationServiceError::InconsistentState("created annotation differs from request"),
            )),
            Ok(created) => {
                info!(
                    "event=annotation_create module=service status=ok scope={} annotation_id={} start={} end={} duration_ms={}",
                    scope,
                    created.id,
                    span.start(),
                    span.end(),
                    started_at.elapsed().as_millis()
                );
                Ok(created)
            }
            Err(err) => Err(self.log_failure("annotation_create", scope, started_at, err.into())),
        }
    }

    /// Replaces the note of one annotation. Offsets are never touched.
    pub fn update_note(
        &mut self,
        id: AnnotationId,
        note: &str,
    ) -> Result<Annotation, AnnotationServiceError> {
        let started_at = Instant::now();
        let note = normalize_note(note).ok_or(AnnotationServiceError::EmptyNote)?;
        match self.repo.update_note(id, &note) {
            Ok(updated) => {
                info!(
                    "event=annotation_update module=service status=ok scope={} annotation_id={} duration_ms={}",
                    updated.scope,
                    id,
                    started_at.elapsed().as_millis()
                );
                Ok(updated)
            }
            Err(err) => {
                let err = AnnotationServiceError::from(err);
                error!(
                    "event=annotation_update module=service status=error annotation_id={} duration_ms={} error_code={}",
                    id,
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Deletes one annotation. Unknown or already deleted ids return `false`.
    pub fn delete_annotation(&mut self, id: AnnotationId) -> Result<bool, AnnotationServiceError> {
        let started_at = Instant::now();
        match self.repo.delete_annotation(id) {
            Ok(deleted) => {
                info!(
                    "event=annotation_delete module=service status=ok annotation_id={} deleted={} duration_ms={}",
                    id,
                    deleted,
                    started_at.elapsed().as_millis()
                );
                Ok(deleted)
            }
            Err(err) => {
                let err = AnnotationServiceError::from(err);
                error!(
                    "event=annotation_delete module=service status=error annotation_id={} duration_ms={} error_code={}",
                    id,
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn log_failure(
        &self,
        event: &str,
        scope: &Scope,
        started_at: Instant,
        err: AnnotationServiceError,
    ) -> AnnotationServiceError {
        if err.is_rejection() {
            info!(
                "event={event} module=service status=rejected scope={scope} duration_ms={} reason={}",
                started_at.elapsed().as_millis(),
                err.code()
            );
        } else {
            error!(
                "event={event} module=service status=error scope={scope} duration_ms={} error_code={} error={err}",
                started_at.elapsed().as_millis(),
                err.code()
            );
        }
        err
    }
}
