use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::StudentId;
use crate::summary::ImportWarning;

/// Where a snapshot's files came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The default-named archive, always the latest submission
    DefaultTar,
    /// A numbered archive `sub<N>.tar`
    NumberedTar(u32),
    /// The pre-submission archive used as a sole-file fallback
    PreSubmission,
    /// A log entry whose archive was overwritten; never carries files
    Overwritten(u32),
    /// A timestamped directory
    Directory(String),
    /// A snapshot assembled by the importer without a real timeline
    Synthetic,
}

impl SnapshotSource {
    /// Canonical sources win ties against other snapshots at the same instant
    pub fn is_canonical(&self) -> bool {
        matches!(self, SnapshotSource::DefaultTar)
    }

    pub fn label(&self) -> String {
        match self {
            SnapshotSource::DefaultTar => "default".to_string(),
            SnapshotSource::NumberedTar(n) => format!("sub{}", n),
            SnapshotSource::PreSubmission => "pre-submission".to_string(),
            SnapshotSource::Overwritten(n) => format!("overwritten#{}", n),
            SnapshotSource::Directory(name) => name.clone(),
            SnapshotSource::Synthetic => "synthetic".to_string(),
        }
    }
}

/// One point-in-time view of a student's submitted files
///
/// `files` maps a required logical name to an extracted temp path. The
/// temp paths are owned by the import run's scratch directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub source: SnapshotSource,
    pub files: BTreeMap<String, PathBuf>,
}

impl SubmissionSnapshot {
    pub fn new(timestamp: DateTime<Utc>, source: SnapshotSource) -> Self {
        Self {
            timestamp,
            source,
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, logical_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(logical_name.into(), path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Everything an importer found for one student, oldest snapshot first
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSubmission {
    pub student_id: StudentId,
    pub snapshots: Vec<SubmissionSnapshot>,
    pub warnings: Vec<ImportWarning>,
}

impl StudentSubmission {
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            snapshots: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn has_files(&self) -> bool {
        self.snapshots.iter().any(|s| !s.is_empty())
    }
}
