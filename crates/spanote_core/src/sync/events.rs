//! Annotation change events and local merge.

use crate::model::annotation::{Annotation, AnnotationId, Scope};
use crate::model::annotation_set::AnnotationSet;
use log::warn;
use serde::{Deserialize, Serialize};

/// One change pushed by the backing store for a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnnotationEvent {
    Created { annotation: Annotation },
    Updated { annotation: Annotation },
    Deleted { scope: Scope, id: AnnotationId },
}

/// Result of merging one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The collection changed.
    Applied,
    /// The event was already reflected locally.
    Unchanged,
    /// The event targets another scope.
    OtherScope,
}

impl AnnotationEvent {
    pub fn scope(&self) -> &Scope {
        match self {
            Self::Created { annotation } | Self::Updated { annotation } => &annotation.scope,
            Self::Deleted { scope, .. } => scope,
        }
    }

    /// Merges this event into `set`.
    pub fn apply_to(&self, set: &mut AnnotationSet) -> MergeOutcome {
        if self.scope() != set.scope() {
            return MergeOutcome::OtherScope;
        }
        match self {
            Self::Created { annotation } | Self::Updated { annotation } => {
                if set.get(annotation.id) == Some(annotation) {
                    return MergeOutcome::Unchanged;
                }
                let blocked = set
                    .iter()
                    .any(|item| item.id != annotation.id && item.span.overlaps(annotation.span));
                if blocked {
                    warn!(
                        "event=sync_merge module=sync status=conflict scope={} annotation_id={} start={} end={}",
                        annotation.scope,
                        annotation.id,
                        annotation.span.start(),
                        annotation.span.end()
                    );
                }
                set.upsert(annotation.clone());
                MergeOutcome::Applied
            }
            Self::Deleted { id, .. } => match set.remove(*id) {
                Some(_) => MergeOutcome::Applied,
                None => MergeOutcome::Unchanged,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnnotationEvent, MergeOutcome};
    use crate::model::annotation::{Annotation, Scope, Span};
    use crate::model::annotation_set::AnnotationSet;
    use uuid::Uuid;

    fn annotation(scope: &Scope, start: usize, end: usize) -> Annotation {
        Annotation {
            id: Uuid::new_v4(),
            scope: scope.clone(),
            span: Span::new(start, end).unwrap(),
            highlighted_text: "x".repeat(end - start),
            note: "remote".to_string(),
            author: Some("other-user".to_string()),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn created_updated_and_deleted_events_merge() {
        let scope = Scope::new("run-1", "output");
        let mut set = AnnotationSet::new(scope.clone());
        let remote = annotation(&scope, 2, 5);

        let created = AnnotationEvent::Created {
            annotation: remote.clone(),
        };
        assert_eq!(created.apply_to(&mut set), MergeOutcome::Applied);
        assert_eq!(created.apply_to(&mut set), MergeOutcome::Unchanged);

        let mut edited = remote.clone();
        edited.note = "edited remotely".to_string();
        edited.updated_at = 2;
        let updated = AnnotationEvent::Updated { annotation: edited };
        assert_eq!(updated.apply_to(&mut set), MergeOutcome::Applied);
        assert_eq!(set.get(remote.id).unwrap().note, "edited remotely");

        let deleted = AnnotationEvent::Deleted {
            scope: scope.clone(),
            id: remote.id,
        };
        assert_eq!(deleted.apply_to(&mut set), MergeOutcome::Applied);
        assert_eq!(deleted.apply_to(&mut set), MergeOutcome::Unchanged);
        assert!(set.is_empty());
    }

    #[test]
    fn events_for_other_scopes_are_ignored() {
        let scope = Scope::new("run-1", "output");
        let other = Scope::new("run-2", "output");
        let mut set = AnnotationSet::new(scope);
        let event = AnnotationEvent::Created {
            annotation: annotation(&other, 0, 3),
        };
        assert_eq!(event.apply_to(&mut set), MergeOutcome::OtherScope);
        assert!(set.is_empty());
    }

    #[test]
    fn event_wire_shape_is_tagged() {
        let scope = Scope::new("run-1", "output");
        let event = AnnotationEvent::Deleted {
            scope,
            id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "deleted");
        assert_eq!(json["scope"]["field"], "output");
    }
}
