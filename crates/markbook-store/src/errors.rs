//! Error helpers for markbook-store
//!
//! Store operations outside a student's transaction report `ExError`s;
//! the per-student apply path reports `ImportError`s instead.

use markbook_core::errors::{ExError, ExErrorKind};

pub type Result<T> = std::result::Result<T, ExError>;

pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("migration {migration_id} failed: {reason}"))
}

pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "migration {migration_id} was edited after being applied \
             (recorded {expected}, embedded {actual})"
        ))
}

pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

pub fn mirror_error(operation: &str, remote_path: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Mirror)
        .with_op(operation.to_string())
        .with_entity_id(remote_path.to_string())
        .with_message(reason)
}

/// Whether a rusqlite error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}
