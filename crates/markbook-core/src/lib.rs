//! Markbook core: the pure side of submission import
//!
//! This crate holds the domain model shared by the importers, the store and
//! the engine:
//! - Error facility (`ExError`) and the import error taxonomy
//! - Structured logging facility and op-boundary macros
//! - Student ids, required file sets and submission snapshots
//! - Latest-file resolution across a student's snapshots
//! - The reconciliation planner, which turns a resolution plus the stored
//!   book into a `StudentPlan` without writing anything
//! - Collaborator traits for hashing, page counting and replication

pub mod collaborators;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod resolve;
pub mod summary;

pub use collaborators::{ContentHasher, NoopReplicator, PageCountError, PageCounter, Replicator};
pub use errors::{ExError, ExErrorKind, ImportError, Result};
pub use model::{
    ExistingBook, NewPage, PageRecord, RequiredFileSet, SnapshotSource, StudentId,
    StudentSubmission, SubmissionSnapshot,
};
pub use policy::{ImportPolicy, OverwrittenPolicy};
pub use reconcile::{PendingCopy, PlanAction, Reconciler, SkipReason, StudentPlan};
pub use resolve::{resolve_files, Resolution, ResolvedFile};
pub use summary::{CopyFailure, ImportSummary, ImportWarning, Outcome, StudentFailure, WarningKind};
