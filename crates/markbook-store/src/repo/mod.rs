//! Repository layer over the SQLite schema

pub mod sqlite_repo;

pub use sqlite_repo::{AppliedPlan, BookRecord, SqliteRepo, TaskRecord};
