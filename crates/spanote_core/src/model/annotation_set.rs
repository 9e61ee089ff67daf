//! In-memory annotation collection for one scope.
//!
//! # Responsibility
//! - Hold the local snapshot used by the overlap fast path and the renderer.
//! - Keep items ordered by `start_offset` for deterministic rendering.
//!
//! # Invariants
//! - Every item belongs to `scope`; foreign-scope records are refused.
//! - Ids are unique within the set.
//! - `try_insert` never admits an overlapping span. `upsert` mirrors storage
//!   or remote truth as-is, so overlaps created by a cross-client race stay
//!   visible to `overlapping_pairs`.

use crate::engine::overlap::find_conflicts;
use crate::model::annotation::{Annotation, AnnotationId, Scope};
use serde::Serialize;

/// Ordered, scope-bound annotation collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationSet {
    scope: Scope,
    items: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            items: Vec::new(),
        }
    }

    /// Builds a set from storage rows, dropping rows of other scopes.
    pub fn from_annotations(scope: Scope, annotations: Vec<Annotation>) -> Self {
        let mut set = Self::new(scope);
        for annotation in annotations {
            set.upsert(annotation);
        }
        set
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items sorted by `(start_offset, end_offset)`.
    pub fn as_slice(&self) -> &[Annotation] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.get(id).is_some()
    }

    /// Inserts an annotation unless it overlaps an existing one.
    ///
    /// Returns the ids of the blocking annotations on rejection. A record
    /// with an id already in the set replaces it.
    pub fn try_insert(&mut self, annotation: Annotation) -> Result<(), Vec<AnnotationId>> {
        if annotation.scope != self.scope {
            return Err(Vec::new());
        }
        let conflicts: Vec<AnnotationId> = find_conflicts(annotation.span, &self.items)
            .into_iter()
            .filter(|existing| existing.id != annotation.id)
            .map(|existing| existing.id)
            .collect();
        if !conflicts.is_empty() {
            return Err(conflicts);
        }
        self.upsert(annotation);
        Ok(())
    }

    /// Inserts or replaces by id without the overlap check.
    ///
    /// Returns `false` when the record belongs to another scope.
    pub fn upsert(&mut self, annotation: Annotation) -> bool {
        if annotation.scope != self.scope {
            return false;
        }
        self.items.retain(|item| item.id != annotation.id);
        let position = self
            .items
            .partition_point(|item| (item.span, item.id) < (annotation.span, annotation.id));
        self.items.insert(position, annotation);
        true
    }

    /// Replaces the note of one annotation. Offsets stay untouched.
    pub fn update_note(
        &mut self,
        id: AnnotationId,
        note: impl Into<String>,
        updated_at: i64,
    ) -> Option<&Annotation> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.note = note.into();
        item.updated_at = updated_at;
        Some(item)
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let position = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(position))
    }

    /// Pairs of ids whose spans intersect. Empty when the invariant holds.
    pub fn overlapping_pairs(&self) -> Vec<(AnnotationId, AnnotationId)> {
        let mut pairs = Vec::new();
        for (idx, left) in self.items.iter().enumerate() {
            for right in &self.items[idx + 1..] {
                if right.span.start() >= left.span.end() {
                    break;
                }
                pairs.push((left.id, right.id));
            }
        }
        pairs
    }
}
