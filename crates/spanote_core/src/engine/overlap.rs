//! Overlap validation for candidate spans.
//!
//! Pure decision functions; "overlaps" is an expected outcome and is
//! reported as a value, never as an error.

use crate::model::annotation::{Annotation, Span};

/// Returns whether `[start, end)` may be added next to `existing`.
///
/// False for empty or reversed candidates and for any strict intersection
/// with an existing annotation. Touching boundaries are allowed.
pub fn can_insert(start: usize, end: usize, existing: &[Annotation]) -> bool {
    match Span::new(start, end) {
        Ok(span) => !existing.iter().any(|item| item.span.overlaps(span)),
        Err(_) => false,
    }
}

/// Returns the annotations in `existing` that intersect `span`, in input order.
pub fn find_conflicts(span: Span, existing: &[Annotation]) -> Vec<&Annotation> {
    existing
        .iter()
        .filter(|item| item.span.overlaps(span))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{can_insert, find_conflicts};
    use crate::model::annotation::{Annotation, Scope, Span};
    use uuid::Uuid;

    fn existing() -> Vec<Annotation> {
        [(4, 9, "quick"), (16, 19, "fox")]
            .into_iter()
            .map(|(start, end, text)| Annotation {
                id: Uuid::new_v4(),
                scope: Scope::new("run-1", "output"),
                span: Span::new(start, end).unwrap(),
                highlighted_text: text.to_string(),
                note: "n".to_string(),
                author: None,
                created_at: 0,
                updated_at: 0,
            })
            .collect()
    }

    #[test]
    fn rejects_empty_and_reversed_candidates() {
        assert!(!can_insert(5, 5, &[]));
        assert!(!can_insert(6, 2, &[]));
        assert!(can_insert(0, 1, &[]));
    }

    #[test]
    fn rejects_any_intersection() {
        let items = existing();
        assert!(!can_insert(7, 17, &items));
        assert!(!can_insert(8, 10, &items));
        assert!(!can_insert(5, 6, &items));
        assert!(!can_insert(0, 27, &items));
    }

    #[test]
    fn accepts_gaps_and_touching_boundaries() {
        let items = existing();
        assert!(can_insert(10, 15, &items));
        assert!(can_insert(9, 16, &items));
        assert!(can_insert(0, 4, &items));
        assert!(can_insert(19, 27, &items));
    }

    #[test]
    fn find_conflicts_lists_every_blocker() {
        let items = existing();
        let conflicts = find_conflicts(Span::new(7, 17).unwrap(), &items);
        let texts: Vec<&str> = conflicts
            .iter()
            .map(|item| item.highlighted_text.as_str())
            .collect();
        assert_eq!(texts, vec!["quick", "fox"]);
    }
}
