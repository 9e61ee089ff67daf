//! Annotation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide list/create/update-note/delete persistence for annotations.
//! - Own the authoritative non-overlap check (check-and-insert in one
//!   `IMMEDIATE` transaction, backed by a schema trigger).
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - Only `note` and `updated_at` are ever updated; span columns are fixed.
//! - Tombstoned rows (`is_deleted=1`) never appear in reads or overlap checks.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::annotation::{
    normalize_note, Annotation, AnnotationDraft, AnnotationId, AnnotationValidationError, Scope,
    Span,
};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ANNOTATION_SELECT_SQL: &str = "SELECT
    uuid,
    record_id,
    field_name,
    start_offset,
    end_offset,
    highlighted_text,
    note,
    author,
    created_at,
    updated_at
FROM annotations";

const OVERLAP_TRIGGER_MESSAGE: &str = "annotation_overlap";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for annotation persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(AnnotationValidationError),
    Db(DbError),
    NotFound(AnnotationId),
    /// Storage already holds annotations intersecting the draft span.
    ///
    /// `conflicting` is empty when only the schema trigger caught it.
    Overlap {
        conflicting: Vec<AnnotationId>,
    },
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "annotation not found: {id}"),
            Self::Overlap { conflicting } => write!(
                f,
                "annotation overlaps {} existing annotation(s)",
                conflicting.len().max(1)
            ),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted annotation data: {message}")
            }
            Self::MissingRequiredTable(table) => write!(f, "missing required table: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AnnotationValidationError> for RepoError {
    fn from(value: AnnotationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_overlap_trigger(&value) {
            return Self::Overlap {
                conflicting: Vec::new(),
            };
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for annotation records.
pub trait AnnotationRepository {
    /// Lists active annotations of one scope ordered by `start_offset`.
    fn list_annotations(&self, scope: &Scope) -> RepoResult<Vec<Annotation>>;
    /// Gets one active annotation by id.
    fn get_annotation(&self, id: AnnotationId) -> RepoResult<Option<Annotation>>;
    /// Atomically checks for overlap and inserts; returns the stored record.
    fn create_annotation(&mut self, draft: &AnnotationDraft) -> RepoResult<Annotation>;
    /// Replaces the note of one active annotation.
    fn update_note(&mut self, id: AnnotationId, note: &str) -> RepoResult<Annotation>;
    /// Tombstones one annotation. Returns `false` when nothing was active.
    fn delete_annotation(&mut self, id: AnnotationId) -> RepoResult<bool>;
}

/// SQLite-backed annotation repository.
pub struct SqliteAnnotationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteAnnotationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        if !table_exists(conn, "annotations")? {
            return Err(RepoError::MissingRequiredTable("annotations"));
        }
        Ok(Self { conn })
    }
}

impl AnnotationRepository for SqliteAnnotationRepository<'_> {
    fn list_annotations(&self, scope: &Scope) -> RepoResult<Vec<Annotation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ANNOTATION_SELECT_SQL}
             WHERE record_id = ?1
               AND field_name = ?2
               AND is_deleted = 0
             ORDER BY start_offset ASC, end_offset ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![scope.record_id, scope.field])?;
        let mut annotations = Vec::new();
        while let Some(row) = rows.next()? {
            annotations.push(parse_annotation_row(row)?);
        }
        Ok(annotations)
    }

    fn get_annotation(&self, id: AnnotationId) -> RepoResult<Option<Annotation>> {
        select_active(&*self.conn, id)
    }

    fn create_annotation(&mut self, draft: &AnnotationDraft) -> RepoResult<Annotation> {
        draft.validate()?;
        let note = normalize_note(&draft.note).ok_or(AnnotationValidationError::EmptyNote)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let conflicting = conflicting_ids(&tx, &draft.scope, draft.span)?;
        if !conflicting.is_empty() {
            return Err(RepoError::Overlap { conflicting });
        }

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO annotations (
                uuid,
                record_id,
                field_name,
                start_offset,
                end_offset,
                highlighted_text,
                note,
                author
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                draft.scope.record_id,
                draft.scope.field,
                offset_to_db(draft.span.start())?,
                offset_to_db(draft.span.end())?,
                draft.highlighted_text,
                note,
                draft.author.as_deref(),
            ],
        )?;

        let created = select_active(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("annotation {id} missing after insert"))
        })?;
        tx.commit()?;
        Ok(created)
    }

    fn update_note(&mut self, id: AnnotationId, note: &str) -> RepoResult<Annotation> {
        let note = normalize_note(note).ok_or(AnnotationValidationError::EmptyNote)?;
        let changed = self.conn.execute(
            "UPDATE annotations
             SET
                note = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            params![id.to_string(), note],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        select_active(&*self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn delete_annotation(&mut self, id: AnnotationId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE annotations
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

fn select_active(conn: &Connection, id: AnnotationId) -> RepoResult<Option<Annotation>> {
    let mut stmt = conn.prepare(&format!(
        "{ANNOTATION_SELECT_SQL}
         WHERE uuid = ?1
           AND is_deleted = 0;"
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_annotation_row(row)?));
    }
    Ok(None)
}

fn conflicting_ids(conn: &Connection, scope: &Scope, span: Span) -> RepoResult<Vec<AnnotationId>> {
    let mut stmt = conn.prepare(
        "SELECT uuid
         FROM annotations
         WHERE record_id = ?1
           AND field_name = ?2
           AND is_deleted = 0
           AND start_offset < ?4
           AND ?3 < end_offset
         ORDER BY start_offset ASC;",
    )?;
    let mut rows = stmt.query(params![
        scope.record_id,
        scope.field,
        offset_to_db(span.start())?,
        offset_to_db(span.end())?,
    ])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get(0)?;
        ids.push(parse_uuid(&uuid_text)?);
    }
    Ok(ids)
}

fn parse_annotation_row(row: &Row<'_>) -> RepoResult<Annotation> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text)?;

    let start = offset_from_db(row.get("start_offset")?, "start_offset")?;
    let end = offset_from_db(row.get("end_offset")?, "end_offset")?;
    let span = Span::new(start, end).map_err(|err| {
        RepoError::InvalidData(format!("invalid span for annotation {id}: {err}"))
    })?;

    let annotation = Annotation {
        id,
        scope: Scope::new(
            row.get::<_, String>("record_id")?,
            row.get::<_, String>("field_name")?,
        ),
        span,
        highlighted_text: row.get("highlighted_text")?,
        note: row.get("note")?,
        author: row.get("author")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    annotation.validate()?;
    Ok(annotation)
}

fn parse_uuid(value: &str) -> RepoResult<AnnotationId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in annotations.uuid"))
    })
}

fn offset_from_db(value: i64, column: &str) -> RepoResult<usize> {
    usize::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid offset `{value}` in annotations.{column}"))
    })
}

fn offset_to_db(value: usize) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("offset `{value}` exceeds storage range")))
}

fn is_overlap_trigger(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains(OVERLAP_TRIGGER_MESSAGE)
    )
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
