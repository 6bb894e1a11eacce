use markbook_core_types::RequestId;
use thiserror::Error;

use crate::model::StudentId;

/// Result type alias using ImportError
pub type Result<T> = std::result::Result<T, ImportError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that is safe to match on in tests,
/// in the CLI exit path and in any outer API that reports import failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    InvalidInput,
    NotFound,

    // Archive-level
    Unpack,
    FormatDiscovery,
    UnsupportedLayout,

    // Student-level
    MissingLog,
    MalformedLog,
    AmbiguousSubmission,
    DocumentSplit,
    TaskLocked,
    DuplicateBook,
    Reconciliation,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Config,
    Mirror,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Unpack => "ERR_UNPACK",
            ExErrorKind::FormatDiscovery => "ERR_FORMAT_DISCOVERY",
            ExErrorKind::UnsupportedLayout => "ERR_UNSUPPORTED_LAYOUT",
            ExErrorKind::MissingLog => "ERR_MISSING_LOG",
            ExErrorKind::MalformedLog => "ERR_MALFORMED_LOG",
            ExErrorKind::AmbiguousSubmission => "ERR_AMBIGUOUS_SUBMISSION",
            ExErrorKind::DocumentSplit => "ERR_DOCUMENT_SPLIT",
            ExErrorKind::TaskLocked => "ERR_TASK_LOCKED",
            ExErrorKind::DuplicateBook => "ERR_DUPLICATE_BOOK",
            ExErrorKind::Reconciliation => "ERR_RECONCILIATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Mirror => "ERR_MIRROR",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus a human message and an optional detail
/// string, which is what the batch surface reports back to operators.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    student_id: Option<String>,
    entity_id: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    detail: Option<String>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            student_id: None,
            entity_id: None,
            request_id: None,
            message: String::new(),
            detail: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add student context
    pub fn with_student_id(mut self, id: impl Into<String>) -> Self {
        self.student_id = Some(id.into());
        self
    }

    /// Add entity ID context (task name, book id, file path)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a detail string (usually the underlying cause)
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the student context, if any
    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the detail string, if any
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        if let Some(student_id) = &self.student_id {
            write!(f, " (student_id: {})", student_id)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for the import pipeline
///
/// Variants that carry a `student_id` are scoped to one student: the run
/// records them and moves on. The rest abort the run before any book is
/// touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    // ===== Archive-level =====
    /// The archive could not be read or its format is not recognised
    #[error("Failed to unpack archive {archive}: {reason}")]
    Unpack { archive: String, reason: String },

    /// Extraction target already contains files
    #[error("Extract directory is not empty: {dir}")]
    TargetNotEmpty { dir: String },

    /// The expected student-folder root could not be located
    #[error("Cannot locate submissions: {reason}")]
    FormatDiscovery { reason: String },

    /// A recognised but unsupported layout (e.g. team submissions)
    #[error("Unsupported submission layout: {layout}")]
    UnsupportedLayout { layout: String, detail: String },

    /// Required file list is empty or names an unsafe path
    #[error("Invalid required file list: {reason}")]
    InvalidRequiredFiles { reason: String },

    /// Task cannot accept imports
    #[error("Task has been locked: {task}")]
    TaskLocked { task: String },

    // ===== Student-level =====
    /// Student folder has submissions but no log
    #[error("No log file in student folder for {student_id}")]
    MissingLog { student_id: StudentId },

    /// A log line could not be parsed
    #[error("Malformed log for {student_id} at line {line}: {reason}")]
    MalformedLog {
        student_id: StudentId,
        line: usize,
        reason: String,
    },

    /// More than one candidate document where exactly one was expected
    #[error("Ambiguous submission for {student_id}: {candidates:?}")]
    AmbiguousSubmission {
        student_id: StudentId,
        candidates: Vec<String>,
    },

    /// Snapshot directory name is not a valid timestamp
    #[error("Invalid submission timestamp for {student_id}: {value}")]
    InvalidTimestamp { student_id: StudentId, value: String },

    /// The page counter rejected a file
    #[error("Failed to split {file} for {student_id}: {reason}")]
    DocumentSplit {
        student_id: StudentId,
        file: String,
        reason: String,
    },

    /// Another book already exists for (task, student)
    #[error("Duplicate book for {student_id} in task {task}")]
    DuplicateBook { task: String, student_id: StudentId },

    /// Invalid persisted state detected while reconciling
    #[error("Reconciliation failed for {student_id}: {reason}")]
    Reconciliation { student_id: StudentId, reason: String },

    /// Filesystem failure while processing one student
    #[error("I/O failure in {op} for {student_id}: {reason}")]
    StudentIo {
        student_id: StudentId,
        op: String,
        reason: String,
    },

    // ===== Integration =====
    /// Filesystem failure outside any student's scope
    #[error("I/O failure in {op}: {reason}")]
    Io { op: String, reason: String },
}

impl ImportError {
    /// The student this error is scoped to, if any
    pub fn student_id(&self) -> Option<&StudentId> {
        match self {
            ImportError::MissingLog { student_id }
            | ImportError::MalformedLog { student_id, .. }
            | ImportError::AmbiguousSubmission { student_id, .. }
            | ImportError::InvalidTimestamp { student_id, .. }
            | ImportError::DocumentSplit { student_id, .. }
            | ImportError::DuplicateBook { student_id, .. }
            | ImportError::Reconciliation { student_id, .. }
            | ImportError::StudentIo { student_id, .. } => Some(student_id),
            _ => None,
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal_for_run(&self) -> bool {
        self.student_id().is_none()
    }

    /// Build a student-scoped I/O error
    pub fn student_io(student_id: &StudentId, op: &str, err: &std::io::Error) -> Self {
        ImportError::StudentIo {
            student_id: student_id.clone(),
            op: op.to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a run-scoped I/O error
    pub fn io(op: &str, err: &std::io::Error) -> Self {
        ImportError::Io {
            op: op.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Conversion from ImportError to ExError
impl From<ImportError> for ExError {
    fn from(err: ImportError) -> Self {
        match &err {
            ImportError::Unpack { archive, reason } => ExError::new(ExErrorKind::Unpack)
                .with_entity_id(archive.clone())
                .with_message("failed to unpack archive")
                .with_detail(reason.clone()),

            ImportError::TargetNotEmpty { dir } => ExError::new(ExErrorKind::Unpack)
                .with_entity_id(dir.clone())
                .with_message("extract dir is not empty"),

            ImportError::FormatDiscovery { reason } => {
                ExError::new(ExErrorKind::FormatDiscovery).with_message(reason.clone())
            }

            ImportError::UnsupportedLayout { layout, detail } => {
                ExError::new(ExErrorKind::UnsupportedLayout)
                    .with_message(format!("{} is not supported", layout))
                    .with_detail(detail.clone())
            }

            ImportError::InvalidRequiredFiles { reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_message("invalid required file list")
                .with_detail(reason.clone()),

            ImportError::TaskLocked { task } => ExError::new(ExErrorKind::TaskLocked)
                .with_entity_id(task.clone())
                .with_message("task has been locked"),

            ImportError::MissingLog { student_id } => ExError::new(ExErrorKind::MissingLog)
                .with_student_id(student_id.as_str())
                .with_message("no log file in student folder"),

            ImportError::MalformedLog {
                student_id,
                line,
                reason,
            } => ExError::new(ExErrorKind::MalformedLog)
                .with_student_id(student_id.as_str())
                .with_message(format!("malformed log line {}", line))
                .with_detail(reason.clone()),

            ImportError::AmbiguousSubmission {
                student_id,
                candidates,
            } => ExError::new(ExErrorKind::AmbiguousSubmission)
                .with_student_id(student_id.as_str())
                .with_message("more than one matching document")
                .with_detail(candidates.join(", ")),

            ImportError::InvalidTimestamp { student_id, value } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_student_id(student_id.as_str())
                    .with_message("invalid submission timestamp")
                    .with_detail(value.clone())
            }

            ImportError::DocumentSplit {
                student_id,
                file,
                reason,
            } => ExError::new(ExErrorKind::DocumentSplit)
                .with_student_id(student_id.as_str())
                .with_entity_id(file.clone())
                .with_message("failed to count pages")
                .with_detail(reason.clone()),

            ImportError::DuplicateBook { task, student_id } => {
                ExError::new(ExErrorKind::DuplicateBook)
                    .with_student_id(student_id.as_str())
                    .with_entity_id(task.clone())
                    .with_message("duplicate book")
            }

            ImportError::Reconciliation { student_id, reason } => {
                ExError::new(ExErrorKind::Reconciliation)
                    .with_student_id(student_id.as_str())
                    .with_message("reconciliation failed")
                    .with_detail(reason.clone())
            }

            ImportError::StudentIo {
                student_id,
                op,
                reason,
            } => ExError::new(ExErrorKind::Io)
                .with_op(op.clone())
                .with_student_id(student_id.as_str())
                .with_message(reason.clone()),

            ImportError::Io { op, reason } => ExError::new(ExErrorKind::Io)
                .with_op(op.clone())
                .with_message(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::Unpack, "ERR_UNPACK"),
            (ExErrorKind::FormatDiscovery, "ERR_FORMAT_DISCOVERY"),
            (ExErrorKind::UnsupportedLayout, "ERR_UNSUPPORTED_LAYOUT"),
            (ExErrorKind::AmbiguousSubmission, "ERR_AMBIGUOUS_SUBMISSION"),
            (ExErrorKind::DocumentSplit, "ERR_DOCUMENT_SPLIT"),
            (ExErrorKind::TaskLocked, "ERR_TASK_LOCKED"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_student_scoped_errors_are_not_fatal() {
        let sid = StudentId::normalize("1234567").unwrap();
        let err = ImportError::AmbiguousSubmission {
            student_id: sid.clone(),
            candidates: vec!["a.pdf".into(), "b.pdf".into()],
        };
        assert_eq!(err.student_id(), Some(&sid));
        assert!(!err.is_fatal_for_run());
    }

    #[test]
    fn test_archive_errors_are_fatal() {
        let err = ImportError::UnsupportedLayout {
            layout: "team submissions".into(),
            detail: "teams.json present".into(),
        };
        assert!(err.is_fatal_for_run());
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::UnsupportedLayout);
        assert_eq!(ex.detail(), Some("teams.json present"));
    }

    #[test]
    fn test_display_includes_message_and_detail() {
        let ex = ExError::new(ExErrorKind::Unpack)
            .with_message("failed to unpack archive")
            .with_detail("bad magic");
        let text = ex.to_string();
        assert!(text.starts_with("[ERR_UNPACK]"));
        assert!(text.contains("failed to unpack archive: bad magic"));
    }
}
