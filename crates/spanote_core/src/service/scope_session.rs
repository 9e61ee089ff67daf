//! Per-scope annotation session.
//!
//! # Responsibility
//! - Own the canonical text and local collection of one displayed scope.
//! - Drive the selection flow: map, pre-check, collect a note, persist.
//! - Merge realtime events and refetches into the local collection.
//!
//! # Invariants
//! - State moves `Idle -> Selecting -> CandidatePending -> Idle`.
//! - The local collection only changes after storage confirms a write, or
//!   when storage truth arrives through `refresh`/`apply_event`.
//! - Rejections always carry an explicit reason.
//! - Writes only ever target annotations of this session's scope.
//! - A candidate is re-checked against the collection at confirm time.

use crate::content::ContentSource;
use crate::engine::overlap::find_conflicts;
use crate::engine::partition::{partition, Segment};
use crate::engine::selection::{map_offsets, map_selection, MappedSelection, SelectionRange};
use crate::model::annotation::{Annotation, AnnotationId, Scope, Span};
use crate::model::annotation_set::AnnotationSet;
use crate::model::text::{char_len, slice_span};
use crate::repo::annotation_repo::AnnotationRepository;
use crate::service::annotation_service::{AnnotationService, AnnotationServiceError};
use crate::sync::events::{AnnotationEvent, MergeOutcome};
use log::{debug, info, warn};

/// Validated selection waiting for a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub span: Span,
    pub text: String,
}

/// Selection flow state of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting,
    CandidatePending(Candidate),
}

/// Why a selection did not become a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Collapsed, outside the rendered text, or otherwise unmappable.
    InvalidSelection,
    /// Intersects the listed annotations.
    Overlap { conflicting: Vec<AnnotationId> },
}

/// Result of finishing a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Candidate(Candidate),
    Rejected(RejectReason),
}

/// Stored data that no longer agrees with the canonical text or invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Span ends beyond the canonical text.
    OutOfBounds { id: AnnotationId, end: usize, content_len: usize },
    /// Stored highlighted text differs from the canonical text under the span.
    StaleHighlight { id: AnnotationId },
    /// Two stored annotations intersect.
    Overlap { first: AnnotationId, second: AnnotationId },
}

/// Annotation state of one displayed (scope, canonical text) pair.
#[derive(Debug, Clone)]
pub struct ScopeSession {
    content: String,
    annotations: AnnotationSet,
    state: SelectionState,
}

impl ScopeSession {
    /// Loads canonical text and stored annotations for `scope`.
    pub fn open<R: AnnotationRepository>(
        service: &AnnotationService<R>,
        source: &dyn ContentSource,
        scope: Scope,
    ) -> Result<Self, AnnotationServiceError> {
        let content = source.canonical_text(&scope)?;
        let annotations = service.load_scope(&scope)?;
        let session = Self::with_content(content, annotations);
        let issues = session.integrity_issues();
        if !issues.is_empty() {
            warn!(
                "event=session_open module=service status=degraded scope={} issue_count={}",
                session.scope(),
                issues.len()
            );
        }
        Ok(session)
    }

    /// Builds a session from already loaded parts.
    pub fn with_content(content: impl Into<String>, annotations: AnnotationSet) -> Self {
        Self {
            content: content.into(),
            annotations,
            state: SelectionState::Idle,
        }
    }

    pub fn scope(&self) -> &Scope {
        self.annotations.scope()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn pending_candidate(&self) -> Option<&Candidate> {
        match &self.state {
            SelectionState::CandidatePending(candidate) => Some(candidate),
            _ => None,
        }
    }

    /// Renders the current collection.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        partition(&self.content, self.annotations.as_slice())
    }

    /// The user started dragging a selection.
    pub fn begin_selection(&mut self) {
        self.state = SelectionState::Selecting;
    }

    /// The user released a selection made against `segments()`.
    ///
    /// A new selection replaces any candidate still waiting for a note.
    pub fn finish_selection(&mut self, range: &SelectionRange) -> SelectionOutcome {
        let mapped = {
            let rendered = self.segments();
            map_selection(&rendered, range)
        };
        self.propose(mapped)
    }

    /// Same as `finish_selection` for surfaces reporting canonical offsets.
    pub fn finish_selection_at(&mut self, start: usize, end: usize) -> SelectionOutcome {
        let mapped = map_offsets(&self.content, start, end);
        self.propose(mapped)
    }

    /// Discards the pending candidate, if any.
    pub fn cancel(&mut self) -> Option<Candidate> {
        match std::mem::take(&mut self.state) {
            SelectionState::CandidatePending(candidate) => Some(candidate),
            _ => None,
        }
    }

    /// Persists the pending candidate with `note`.
    ///
    /// Blank notes and storage faults keep the candidate pending so the user
    /// may retry. An overlap, found locally or by storage, drops it.
    pub fn confirm<R: AnnotationRepository>(
        &mut self,
        service: &mut AnnotationService<R>,
        note: &str,
        author: Option<&str>,
    ) -> Result<Annotation, AnnotationServiceError> {
        let candidate = self
            .pending_candidate()
            .cloned()
            .ok_or(AnnotationServiceError::NoPendingCandidate)?;
        if note.trim().is_empty() {
            return Err(AnnotationServiceError::EmptyNote);
        }

        // Events merged since the selection may now block the candidate.
        let conflicting = self.conflicts_with(candidate.span);
        if !conflicting.is_empty() {
            info!(
                "event=selection_confirm module=service status=rejected scope={} reason=overlap conflict_count={}",
                self.scope(),
                conflicting.len()
            );
            self.state = SelectionState::Idle;
            return Err(AnnotationServiceError::OverlapRejected { conflicting });
        }

        let selection = MappedSelection {
            text: candidate.text,
            start: candidate.span.start(),
            end: candidate.span.end(),
        };
        let scope = self.scope().clone();
        match service.create_annotation(&scope, &self.content, &selection, note, author) {
            Ok(created) => {
                self.state = SelectionState::Idle;
                match self.annotations.try_insert(created.clone()) {
                    Ok(()) => Ok(created),
                    Err(conflicting) => {
                        warn!(
                            "event=selection_confirm module=service status=error scope={} annotation_id={} conflict_count={}",
                            scope,
                            created.id,
                            conflicting.len()
                        );
                        Err(AnnotationServiceError::InconsistentState(
                            "stored annotation conflicts with local collection",
                        ))
                    }
                }
            }
            Err(err @ AnnotationServiceError::OverlapRejected { .. }) => {
                self.state = SelectionState::Idle;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Replaces the note of one annotation of this scope.
    ///
    /// Ids owned by another scope are reported as not found.
    pub fn edit_note<R: AnnotationRepository>(
        &mut self,
        service: &mut AnnotationService<R>,
        id: AnnotationId,
        note: &str,
    ) -> Result<Annotation, AnnotationServiceError> {
        if note.trim().is_empty() {
            return Err(AnnotationServiceError::EmptyNote);
        }
        if !self.owns(service, id)? {
            return Err(AnnotationServiceError::AnnotationNotFound(id));
        }
        match service.update_note(id, note) {
            Ok(updated) => {
                self.annotations.upsert(updated.clone());
                Ok(updated)
            }
            Err(err @ AnnotationServiceError::AnnotationNotFound(_)) => {
                self.annotations.remove(id);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes one annotation of this scope.
    ///
    /// Unknown ids and ids of other scopes are a no-op returning `false`.
    pub fn delete<R: AnnotationRepository>(
        &mut self,
        service: &mut AnnotationService<R>,
        id: AnnotationId,
    ) -> Result<bool, AnnotationServiceError> {
        if !self.owns(service, id)? {
            return Ok(false);
        }
        let deleted = service.delete_annotation(id)?;
        let removed = self.annotations.remove(id).is_some();
        Ok(deleted || removed)
    }

    /// Replaces the local collection with storage truth.
    pub fn refresh<R: AnnotationRepository>(
        &mut self,
        service: &AnnotationService<R>,
    ) -> Result<(), AnnotationServiceError> {
        self.annotations = service.load_scope(self.annotations.scope())?;
        Ok(())
    }

    /// Merges one realtime event pushed by the backing store.
    pub fn apply_event(&mut self, event: &AnnotationEvent) -> MergeOutcome {
        let outcome = event.apply_to(&mut self.annotations);
        debug!(
            "event=session_merge module=service status=ok scope={} outcome={:?}",
            self.scope(),
            outcome
        );
        outcome
    }

    /// Spot-checks stored annotations against the canonical text.
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        let content_len = char_len(&self.content);
        let mut issues = Vec::new();
        for annotation in self.annotations.iter() {
            if annotation.span.end() > content_len {
                issues.push(IntegrityIssue::OutOfBounds {
                    id: annotation.id,
                    end: annotation.span.end(),
                    content_len,
                });
            } else if slice_span(&self.content, annotation.span)
                != Some(annotation.highlighted_text.as_str())
            {
                issues.push(IntegrityIssue::StaleHighlight { id: annotation.id });
            }
        }
        for (first, second) in self.annotations.overlapping_pairs() {
            issues.push(IntegrityIssue::Overlap { first, second });
        }
        issues
    }

    /// Whether `id` is an annotation of this scope, locally or in storage.
    ///
    /// Storage is consulted for records created by other clients that have
    /// not been merged yet.
    fn owns<R: AnnotationRepository>(
        &self,
        service: &AnnotationService<R>,
        id: AnnotationId,
    ) -> Result<bool, AnnotationServiceError> {
        if self.annotations.contains(id) {
            return Ok(true);
        }
        let owned = service
            .get_annotation(id)?
            .is_some_and(|stored| stored.scope == *self.scope());
        if !owned {
            debug!(
                "event=session_lookup module=service status=rejected scope={} annotation_id={} reason=not_in_scope",
                self.scope(),
                id
            );
        }
        Ok(owned)
    }

    fn conflicts_with(&self, span: Span) -> Vec<AnnotationId> {
        find_conflicts(span, self.annotations.as_slice())
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    fn propose(&mut self, mapped: Option<MappedSelection>) -> SelectionOutcome {
        let outcome = match mapped.and_then(|mapped| mapped.span().map(|span| (span, mapped.text))) {
            None => SelectionOutcome::Rejected(RejectReason::InvalidSelection),
            Some((span, text)) => {
                let conflicting = self.conflicts_with(span);
                if conflicting.is_empty() {
                    SelectionOutcome::Candidate(Candidate { span, text })
                } else {
                    SelectionOutcome::Rejected(RejectReason::Overlap { conflicting })
                }
            }
        };

        match &outcome {
            SelectionOutcome::Candidate(candidate) => {
                self.state = SelectionState::CandidatePending(candidate.clone());
            }
            SelectionOutcome::Rejected(reason) => {
                info!(
                    "event=selection_finish module=service status=rejected scope={} reason={}",
                    self.scope(),
                    match reason {
                        RejectReason::InvalidSelection => "invalid_selection",
                        RejectReason::Overlap { .. } => "overlap",
                    }
                );
                self.state = SelectionState::Idle;
            }
        }
        outcome
    }
}
