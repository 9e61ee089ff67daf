use spanote_core::db::open_db;
use spanote_core::{
    AnnotationEvent, AnnotationService, AnnotationServiceError, ContentKind, MemoryContentSource,
    MergeOutcome, Scope, ScopeSession, SelectionOutcome, SqliteAnnotationRepository,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

const CONTENT: &str = "The quick brown fox jumps.";

fn scope() -> Scope {
    Scope::new("run-42", "output")
}

fn source() -> MemoryContentSource {
    let mut source = MemoryContentSource::new();
    source.insert(scope(), CONTENT, ContentKind::PlainText);
    source
}

#[test]
fn stale_snapshot_cannot_create_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("spanote.sqlite3");
    let mut conn_a = open_db(&db_path).unwrap();
    let mut conn_b = open_db(&db_path).unwrap();
    let mut service_a =
        AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn_a).unwrap());
    let mut service_b =
        AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn_b).unwrap());

    let mut session_a = ScopeSession::open(&service_a, &source(), scope()).unwrap();
    let mut session_b = ScopeSession::open(&service_b, &source(), scope()).unwrap();

    // Both clients pass their local check against an empty snapshot.
    session_a.begin_selection();
    assert!(matches!(
        session_a.finish_selection_at(4, 9),
        SelectionOutcome::Candidate(_)
    ));
    session_b.begin_selection();
    assert!(matches!(
        session_b.finish_selection_at(7, 12),
        SelectionOutcome::Candidate(_)
    ));

    let winner = session_a.confirm(&mut service_a, "speed", Some("user-a")).unwrap();
    let err = session_b
        .confirm(&mut service_b, "ick br", Some("user-b"))
        .unwrap_err();
    match &err {
        AnnotationServiceError::OverlapRejected { conflicting } => {
            assert_eq!(conflicting, &vec![winner.id]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_rejection());
    assert!(session_b.pending_candidate().is_none());
    assert!(session_b.annotations().is_empty());

    session_b.refresh(&service_b).unwrap();
    assert_eq!(session_b.annotations(), session_a.annotations());
    assert!(session_b.integrity_issues().is_empty());
}

#[test]
fn racing_writers_admit_exactly_one_annotation() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("spanote.sqlite3");
    // Migrate once before the race.
    drop(open_db(&db_path).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let spans = [(4_usize, 9_usize), (6_usize, 15_usize)];
    let handles: Vec<_> = spans
        .into_iter()
        .map(|(start, end)| {
            let barrier = Arc::clone(&barrier);
            let db_path = db_path.clone();
            thread::spawn(move || race_one(&db_path, &barrier, start, end))
        })
        .collect();
    let results: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(results.iter().filter(|created| **created).count(), 1);

    let mut conn = open_db(&db_path).unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn).unwrap());
    let session = ScopeSession::open(&service, &source(), scope()).unwrap();
    assert_eq!(session.annotations().len(), 1);
    assert!(session.integrity_issues().is_empty());
}

fn race_one(db_path: &Path, barrier: &Barrier, start: usize, end: usize) -> bool {
    let mut conn = open_db(db_path).unwrap();
    let mut service = AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn).unwrap());
    let mut session = ScopeSession::open(&service, &source(), scope()).unwrap();
    assert!(matches!(
        session.finish_selection_at(start, end),
        SelectionOutcome::Candidate(_)
    ));
    barrier.wait();
    match session.confirm(&mut service, "racing note", None) {
        Ok(_) => true,
        Err(AnnotationServiceError::OverlapRejected { .. }) => false,
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn pushed_events_converge_with_storage() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("spanote.sqlite3");
    let mut conn_a = open_db(&db_path).unwrap();
    let mut conn_b = open_db(&db_path).unwrap();
    let mut service_a =
        AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn_a).unwrap());
    let mut service_b =
        AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn_b).unwrap());
    let mut session_a = ScopeSession::open(&service_a, &source(), scope()).unwrap();
    let mut session_b = ScopeSession::open(&service_b, &source(), scope()).unwrap();

    session_a.finish_selection_at(16, 19);
    let fox = session_a.confirm(&mut service_a, "animal", None).unwrap();

    // Relay the change the way a realtime channel would.
    let wire = serde_json::to_string(&AnnotationEvent::Created {
        annotation: fox.clone(),
    })
    .unwrap();
    let event: AnnotationEvent = serde_json::from_str(&wire).unwrap();
    assert_eq!(session_b.apply_event(&event), MergeOutcome::Applied);
    assert_eq!(session_b.apply_event(&event), MergeOutcome::Unchanged);

    // Client B now rejects locally without a storage round-trip.
    assert!(matches!(
        session_b.finish_selection_at(18, 22),
        SelectionOutcome::Rejected(_)
    ));

    let edited = session_b.edit_note(&mut service_b, fox.id, "predator").unwrap();
    let relayed = AnnotationEvent::Updated { annotation: edited };
    assert_eq!(session_a.apply_event(&relayed), MergeOutcome::Applied);
    assert_eq!(session_a.annotations().get(fox.id).unwrap().note, "predator");

    assert!(session_a.delete(&mut service_a, fox.id).unwrap());
    let removed = AnnotationEvent::Deleted {
        scope: scope(),
        id: fox.id,
    };
    assert_eq!(session_b.apply_event(&removed), MergeOutcome::Applied);

    let other_scope = AnnotationEvent::Deleted {
        scope: Scope::new("run-42", "input"),
        id: fox.id,
    };
    assert_eq!(session_b.apply_event(&other_scope), MergeOutcome::OtherScope);

    session_b.refresh(&service_b).unwrap();
    assert!(session_b.annotations().is_empty());
}
