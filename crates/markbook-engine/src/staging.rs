//! Phase two of an import: physical copies and replication hand-off
//!
//! Copies run in queue order after every student has been applied. A
//! failed copy is reported and never rolls back the recorded book.

use std::path::PathBuf;

use markbook_core::{CopyFailure, PendingCopy, Replicator, StudentId};
use markbook_store::files::copy_atomic;
use markbook_store::BookLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCopy {
    pub student_id: StudentId,
    pub book_id: i64,
    pub source: PathBuf,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub copied: usize,
    pub failures: Vec<CopyFailure>,
}

#[derive(Debug, Default)]
pub struct Staging {
    copies: Vec<StagedCopy>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, student_id: &StudentId, book_id: i64, copies: &[PendingCopy]) {
        self.copies.extend(copies.iter().map(|copy| StagedCopy {
            student_id: student_id.clone(),
            book_id,
            source: copy.source.clone(),
            file_path: copy.file_path.clone(),
        }));
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Copy every queued file into its book directory, then replicate it
    pub fn commit(self, layout: &BookLayout, replicator: &dyn Replicator) -> CommitReport {
        let mut report = CommitReport::default();

        for copy in self.copies {
            let target = layout.file_path(copy.book_id, &copy.file_path);
            match copy_atomic(&copy.source, &target) {
                Ok(bytes) => {
                    tracing::debug!(
                        student_id = copy.student_id.as_str(),
                        book_id = copy.book_id,
                        file = copy.file_path.as_str(),
                        bytes,
                        "copied book file"
                    );
                    report.copied += 1;
                    replicator.replicate(
                        copy.book_id,
                        &layout.relative_path(copy.book_id, &copy.file_path),
                    );
                }
                Err(err) => {
                    tracing::error!(
                        student_id = copy.student_id.as_str(),
                        book_id = copy.book_id,
                        file = copy.file_path.as_str(),
                        err_code = err.code(),
                        "failed to copy book file: {}",
                        err
                    );
                    report.failures.push(CopyFailure {
                        student_id: copy.student_id,
                        book_id: copy.book_id,
                        file_path: copy.file_path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }
}
