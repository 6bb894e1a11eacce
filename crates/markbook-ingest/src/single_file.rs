//! Fallback importer: one recognised document per student folder

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use markbook_core::errors::ImportError;
use markbook_core::{
    ImportPolicy, ImportWarning, RequiredFileSet, SnapshotSource, StudentSubmission,
    SubmissionSnapshot, WarningKind,
};

use crate::importer::{ImportFormat, Scan, SubmissionImporter};
use crate::layout::{is_hidden, list_files, student_folders, unwrap_single_dir, StudentFolder};

pub struct SingleFileImporter {
    logical_name: String,
    policy: ImportPolicy,
}

impl SingleFileImporter {
    /// # Errors
    ///
    /// `InvalidRequiredFiles` unless exactly one name is required.
    pub fn new(required: RequiredFileSet, policy: ImportPolicy) -> Result<Self, ImportError> {
        match required.names() {
            [only] => Ok(Self {
                logical_name: only.clone(),
                policy,
            }),
            names => Err(ImportError::InvalidRequiredFiles {
                reason: format!(
                    "single-file import needs exactly one file name, got {}",
                    names.len()
                ),
            }),
        }
    }
}

fn has_subdirs(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok()).any(|e| {
                !is_hidden(&e.file_name().to_string_lossy()) && e.path().is_dir()
            })
        })
        .unwrap_or(false)
}

/// Student folder root: a lone wrapper folder is skipped unless it is
/// itself the only student folder
fn find_root(unpacked: &Path) -> PathBuf {
    let inner = unwrap_single_dir(unpacked);
    if inner != unpacked && has_subdirs(&inner) {
        inner
    } else {
        unpacked.to_path_buf()
    }
}

impl SubmissionImporter for SingleFileImporter {
    fn format(&self) -> ImportFormat {
        ImportFormat::SingleFile
    }

    fn scan(&self, unpacked: &Path, _scratch: &Path) -> Result<Scan, ImportError> {
        let root = find_root(unpacked);
        let (folders, warnings) = student_folders(&root)?;

        let logical_name = self.logical_name.clone();
        let policy = self.policy.clone();
        let now = Utc::now();
        let students = folders
            .into_iter()
            .map(move |folder| import_student(&folder, &logical_name, &policy, now));

        Ok(Scan {
            root,
            warnings,
            students: Box::new(students),
        })
    }
}

fn import_student(
    folder: &StudentFolder,
    logical_name: &str,
    policy: &ImportPolicy,
    now: DateTime<Utc>,
) -> Result<StudentSubmission, ImportError> {
    let sid = &folder.student_id;
    let mut submission = StudentSubmission::new(sid.clone());
    let candidates: Vec<String> = list_files(&folder.path)
        .map_err(|e| ImportError::student_io(sid, "list student folder", &e))?
        .into_iter()
        .filter(|f| policy.is_single_file_candidate(f))
        .collect();

    let snapshot = SubmissionSnapshot::new(now, SnapshotSource::Synthetic);
    match candidates.as_slice() {
        [] => {
            submission.warnings.push(ImportWarning::student(
                sid,
                WarningKind::EmptySubmission,
                "no recognised document in folder",
            ));
            submission.snapshots.push(snapshot);
        }
        [only] => {
            let path = folder.path.join(only);
            submission.snapshots.push(snapshot.with_file(logical_name, path));
        }
        _ => {
            return Err(ImportError::AmbiguousSubmission {
                student_id: sid.clone(),
                candidates,
            })
        }
    }

    Ok(submission)
}
