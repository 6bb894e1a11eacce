#![allow(clippy::result_large_err)]

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{Migration, MIGRATIONS};

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS markbook_migrations (
    migration_id TEXT PRIMARY KEY,
    checksum     TEXT NOT NULL,
    applied_at   INTEGER NOT NULL
)";

/// Bring the database up to the latest embedded migration
///
/// # Errors
///
/// Fails if a pending migration's SQL errors, or if an already applied
/// migration's recorded checksum differs from the embedded SQL.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(LEDGER_DDL).map_err(from_rusqlite)?;
    MIGRATIONS.iter().try_for_each(|m| apply_one(conn, m))
}

fn recorded_checksum(conn: &Connection, migration_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT checksum FROM markbook_migrations WHERE migration_id = ?1",
        [migration_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let embedded = compute_checksum(migration.sql);
    if let Some(recorded) = recorded_checksum(conn, migration.id)? {
        if recorded != embedded {
            return Err(checksum_mismatch(migration.id, &recorded, &embedded));
        }
        return Ok(());
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO markbook_migrations (migration_id, checksum, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.id, embedded, chrono::Utc::now().timestamp()],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id = migration.id, "applied migration");
    Ok(())
}
