use rusqlite::Connection;
use spanote_core::db::migrations::latest_version;
use spanote_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn fresh_connection_has_schema_and_guards() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(user_version(&conn), latest_version());
    for (kind, name) in [
        ("table", "annotations"),
        ("index", "idx_annotations_scope"),
        ("trigger", "trg_annotations_no_overlap"),
        ("trigger", "trg_annotations_immutable_span"),
    ] {
        assert!(has_object(&conn, kind, name), "{kind} {name} missing");
    }
}

#[test]
fn annotations_table_exposes_expected_columns() {
    let conn = open_db_in_memory().unwrap();
    let mut stmt = conn.prepare("PRAGMA table_info(annotations);").unwrap();
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        columns,
        vec![
            "uuid",
            "record_id",
            "field_name",
            "start_offset",
            "end_offset",
            "highlighted_text",
            "note",
            "author",
            "created_at",
            "updated_at",
            "is_deleted",
        ]
    );
}

#[test]
fn reopening_a_file_keeps_rows_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spanote.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO annotations (uuid, record_id, field_name, start_offset, end_offset, highlighted_text, note)
         VALUES ('a', 'run-1', 'output', 4, 9, 'quick', 'speed');",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(user_version(&conn), latest_version());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM annotations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn version_one_database_is_upgraded_with_guards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!(
        "../src/db/migrations/0001_annotations.sql"
    ))
    .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    assert!(!has_object(&conn, "trigger", "trg_annotations_no_overlap"));
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(user_version(&conn), latest_version());
    assert!(has_object(&conn, "trigger", "trg_annotations_no_overlap"));
    assert!(has_object(&conn, "trigger", "trg_annotations_immutable_span"));
}

#[test]
fn failing_script_is_reported_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.sqlite3");

    // A foreign table squatting on the name makes the scope index fail.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE annotations (id INTEGER PRIMARY KEY);")
        .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, 1);
            assert_eq!(name, "annotations");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(user_version(&conn), 0);
    assert!(!has_object(&conn, "index", "idx_annotations_scope"));
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion {
            db_version: 999,
            latest_supported,
        } if latest_supported == latest_version()
    ));
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn has_object(conn: &Connection, kind: &str, name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2);",
        [kind, name],
        |row| row.get::<_, i64>(0),
    )
    .map(|exists| exists == 1)
    .unwrap()
}
