//! Aggregate result of one import run

use markbook_core_types::RequestId;

use crate::errors::{ExError, ImportError};
use crate::model::StudentId;

/// What happened to one student's book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Non-fatal conditions surfaced to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A required file came from an older snapshot than the newest one
    PartialStaleness,
    /// One archive in a student's history could not be read
    PerTarExtraction,
    /// Only the pre-submission archive was present
    PreSubmissionFallback,
    /// A numbered archive named by the log is gone
    OverwrittenArchive,
    /// A non-default archive stood in for the default one
    NonDefaultSubstitution,
    /// A student folder had nothing to import
    EmptySubmission,
    /// The page counter rejected one file
    DocumentSplit,
    /// The resolved version is older than the stored one
    OlderThanStored,
    /// The stored copy of a file could not be hashed
    StoredFileUnreadable,
    /// A stored page's file is missing from the data folder
    MissingStoredFile,
    /// Whole-run notices, such as skipped folders
    Run,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::PartialStaleness => "partial_staleness",
            WarningKind::PerTarExtraction => "per_tar_extraction",
            WarningKind::PreSubmissionFallback => "pre_submission_fallback",
            WarningKind::OverwrittenArchive => "overwritten_archive",
            WarningKind::NonDefaultSubstitution => "non_default_substitution",
            WarningKind::EmptySubmission => "empty_submission",
            WarningKind::DocumentSplit => "document_split",
            WarningKind::OlderThanStored => "older_than_stored",
            WarningKind::StoredFileUnreadable => "stored_file_unreadable",
            WarningKind::MissingStoredFile => "missing_stored_file",
            WarningKind::Run => "run",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportWarning {
    pub student_id: Option<StudentId>,
    pub kind: WarningKind,
    pub message: String,
}

impl ImportWarning {
    pub fn student(student_id: &StudentId, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.clone()),
            kind,
            message: message.into(),
        }
    }

    pub fn run(message: impl Into<String>) -> Self {
        Self {
            student_id: None,
            kind: WarningKind::Run,
            message: message.into(),
        }
    }

    /// Emit the warning on the tracing stream
    pub fn emit(&self) {
        match &self.student_id {
            Some(sid) => tracing::warn!(
                student_id = sid.as_str(),
                warning = self.kind.as_str(),
                "{}",
                self.message
            ),
            None => tracing::warn!(warning = self.kind.as_str(), "{}", self.message),
        }
    }
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.student_id {
            Some(sid) => write!(f, "[{}] {}: {}", self.kind.as_str(), sid, self.message),
            None => write!(f, "[{}] {}", self.kind.as_str(), self.message),
        }
    }
}

/// A student excluded from the success counts
#[derive(Debug, Clone)]
pub struct StudentFailure {
    pub student_id: StudentId,
    pub error: ImportError,
}

impl StudentFailure {
    pub fn to_ex_error(&self) -> ExError {
        self.error.clone().into()
    }
}

/// A queued copy that did not land on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub student_id: StudentId,
    pub book_id: i64,
    pub file_path: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub request_id: RequestId,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub copied: usize,
    pub failures: Vec<StudentFailure>,
    pub warnings: Vec<ImportWarning>,
    pub copy_failures: Vec<CopyFailure>,
}

impl ImportSummary {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            created: 0,
            updated: 0,
            skipped: 0,
            copied: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            copy_failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    pub fn record_failure(&mut self, student_id: StudentId, error: ImportError) {
        self.failures.push(StudentFailure { student_id, error });
    }

    /// False if any student failed or any copy did not land
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.copy_failures.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(raw: &str) -> StudentId {
        StudentId::normalize(raw).unwrap()
    }

    #[test]
    fn test_counts_and_completeness() {
        let mut summary = ImportSummary::new(RequestId::new());
        summary.record(Outcome::Created);
        summary.record(Outcome::Skipped);
        summary.record(Outcome::Skipped);
        assert_eq!((summary.created, summary.updated, summary.skipped), (1, 0, 2));
        assert!(summary.is_complete());

        summary.record_failure(
            sid("1"),
            ImportError::MissingLog {
                student_id: sid("1"),
            },
        );
        assert!(!summary.is_complete());
        assert_eq!(summary.processed(), 4);
    }

    #[test]
    fn test_copy_failure_makes_run_incomplete() {
        let mut summary = ImportSummary::new(RequestId::new());
        summary.copy_failures.push(CopyFailure {
            student_id: sid("2"),
            book_id: 7,
            file_path: "a.pdf".into(),
            reason: "disk full".into(),
        });
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_warning_display() {
        let w = ImportWarning::student(&sid("3"), WarningKind::PerTarExtraction, "sub1.tar unreadable");
        assert_eq!(w.to_string(), "[per_tar_extraction] z3: sub1.tar unreadable");
    }
}
