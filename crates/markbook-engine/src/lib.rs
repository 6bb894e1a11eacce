//! Markbook engine: orchestration of archive imports
//!
//! Ties the importers, the pure planner and the store together:
//! unpack, scan, plan and apply per student, then copy book files and hand
//! them to replication once every student has been processed.

pub mod commands;
pub mod config;
pub mod replication;
pub mod staging;

pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use commands::import::{import_archive, ImportContext, ImportRequest};
pub use config::AppConfig;
pub use replication::{ReplicationQueue, ReplicationStats};
pub use staging::{CommitReport, Staging};
