//! Ordered schema migrations for annotation storage.
//!
//! # Responsibility
//! - Keep the registry of SQL scripts bundled into the binary.
//! - Bring a connection from its recorded version to the latest one.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one per script.
//! - All pending scripts run in one transaction; a failure leaves the
//!   previous version in place.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "annotations",
        sql: include_str!("0001_annotations.sql"),
    },
    Migration {
        version: 2,
        name: "annotation_guards",
        sql: include_str!("0002_annotation_guards.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Runs every migration newer than the connection's recorded version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this build.
/// - `MigrationFailed` naming the first script that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        run_one(&tx, migration)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}

fn run_one(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    let script = format!(
        "{}\nPRAGMA user_version = {};",
        migration.sql, migration.version
    );
    tx.execute_batch(&script).map_err(|source| {
        error!(
            "event=db_migrate module=db status=error version={} name={}",
            migration.version, migration.name
        );
        DbError::MigrationFailed {
            version: migration.version,
            name: migration.name,
            source,
        }
    })
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
