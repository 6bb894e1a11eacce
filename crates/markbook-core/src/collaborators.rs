//! Seams to the outside world used by the planner and the engine

use std::path::Path;

use thiserror::Error;

/// Content digest used for change detection
pub trait ContentHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read.
    fn digest(&self, path: &Path) -> std::io::Result<String>;
}

/// Failure reported by a page counter for one document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct PageCountError {
    pub reason: String,
}

impl PageCountError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Counts pages of multi-page documents
pub trait PageCounter: Send + Sync {
    /// # Errors
    ///
    /// Returns `PageCountError` on an unreadable or corrupt document.
    fn count_pages(&self, path: &Path) -> Result<u32, PageCountError>;
}

/// Fire-and-forget replication of a copied book file
pub trait Replicator: Send + Sync {
    /// Schedule replication; must not block on the remote
    fn replicate(&self, book_id: i64, relative_path: &str);
}

/// Replication disabled
pub struct NoopReplicator;

impl Replicator for NoopReplicator {
    fn replicate(&self, _book_id: i64, _relative_path: &str) {}
}
