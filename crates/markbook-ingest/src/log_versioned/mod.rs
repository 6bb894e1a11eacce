//! Importer for folders written by the course submission tool
//!
//! Each student folder holds a `log`, the latest `submission.tar`, a few
//! numbered `sub<N>.tar`, and sometimes a lone `pre-submission.tar`.

pub mod log;
pub mod versions;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use markbook_core::errors::ImportError;
use markbook_core::{
    ImportPolicy, ImportWarning, RequiredFileSet, SnapshotSource, StudentSubmission,
    SubmissionSnapshot, WarningKind,
};

use crate::extract::extract_required;
use crate::importer::{ImportFormat, Scan, SubmissionImporter};
use crate::layout::{
    find_root_by_marker, list_files, numbered_tar, student_folders, StudentFolder, DEFAULT_TAR,
    LOG_FILE, PRE_SUBMISSION_TAR,
};

use self::log::parse_log;
use self::versions::{resolve_versions, VersionSlot};

pub struct LogVersionedImporter {
    required: RequiredFileSet,
    policy: ImportPolicy,
}

impl LogVersionedImporter {
    pub fn new(required: RequiredFileSet, policy: ImportPolicy) -> Self {
        Self { required, policy }
    }
}

impl SubmissionImporter for LogVersionedImporter {
    fn format(&self) -> ImportFormat {
        ImportFormat::LogVersioned
    }

    fn scan(&self, unpacked: &Path, scratch: &Path) -> Result<Scan, ImportError> {
        let root = find_root_by_marker(unpacked, DEFAULT_TAR)?;
        let (folders, warnings) = student_folders(&root)?;
        tracing::debug!(root = %root.display(), students = folders.len(), "located student folders");

        let required = self.required.clone();
        let policy = self.policy.clone();
        let scratch = scratch.to_path_buf();
        let students = folders
            .into_iter()
            .map(move |folder| import_student(&folder, &required, &policy, &scratch));

        Ok(Scan {
            root,
            warnings,
            students: Box::new(students),
        })
    }
}

fn file_mtime(path: &Path) -> std::io::Result<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(fs::metadata(path)?.modified()?))
}

/// Tars to open for one student, oldest first
fn plan_tars(
    folder: &StudentFolder,
    policy: &ImportPolicy,
    submission: &mut StudentSubmission,
) -> Result<Vec<VersionSlot>, ImportError> {
    let sid = &folder.student_id;
    let files = list_files(&folder.path).map_err(|e| ImportError::student_io(sid, "list student folder", &e))?;

    if files.is_empty() {
        submission.warnings.push(ImportWarning::student(
            sid,
            WarningKind::EmptySubmission,
            "student folder is empty",
        ));
        return Ok(Vec::new());
    }

    if policy.pre_submission_fallback && files.len() == 1 && files[0] == PRE_SUBMISSION_TAR {
        let timestamp = file_mtime(&folder.path.join(PRE_SUBMISSION_TAR))
            .map_err(|e| ImportError::student_io(sid, "stat pre-submission", &e))?;
        submission.warnings.push(ImportWarning::student(
            sid,
            WarningKind::PreSubmissionFallback,
            "only a pre-submission archive is present; using its modification time",
        ));
        return Ok(vec![VersionSlot {
            timestamp,
            source: SnapshotSource::PreSubmission,
            tar_name: Some(PRE_SUBMISSION_TAR.to_string()),
        }]);
    }

    if !files.iter().any(|f| f == LOG_FILE) {
        return Err(ImportError::MissingLog {
            student_id: sid.clone(),
        });
    }

    let text = fs::read_to_string(folder.path.join(LOG_FILE))
        .map_err(|e| ImportError::student_io(sid, "read log", &e))?;
    let entries = parse_log(&text, policy.log_utc_offset_minutes).map_err(|e| {
        ImportError::MalformedLog {
            student_id: sid.clone(),
            line: e.line,
            reason: e.reason,
        }
    })?;

    let has_default = files.iter().any(|f| f == DEFAULT_TAR);
    let numbered: BTreeMap<u32, String> = files
        .iter()
        .filter_map(|f| numbered_tar(f).map(|n| (n, f.clone())))
        .collect();

    if entries.is_empty() && (has_default || !numbered.is_empty()) {
        return Err(ImportError::MalformedLog {
            student_id: sid.clone(),
            line: 0,
            reason: "log has no entries but archives are present".to_string(),
        });
    }

    let plan = resolve_versions(&entries, &numbered, has_default, policy.overwritten_policy);
    for n in &plan.missing {
        submission.warnings.push(ImportWarning::student(
            sid,
            WarningKind::OverwrittenArchive,
            format!("log entry {} has no sub{}.tar", n, n),
        ));
    }
    if plan.overwritten > 0 {
        tracing::debug!(
            student_id = sid.as_str(),
            overwritten = plan.overwritten,
            "log entries older than the kept archives"
        );
    }

    Ok(plan.slots)
}

fn import_student(
    folder: &StudentFolder,
    required: &RequiredFileSet,
    policy: &ImportPolicy,
    scratch: &Path,
) -> Result<StudentSubmission, ImportError> {
    let sid = &folder.student_id;
    let mut submission = StudentSubmission::new(sid.clone());
    let slots = plan_tars(folder, policy, &mut submission)?;
    let student_scratch: PathBuf = scratch.join(sid.as_str());

    for slot in slots {
        let Some(tar_name) = slot.tar_name else {
            submission
                .snapshots
                .push(SubmissionSnapshot::new(slot.timestamp, slot.source));
            continue;
        };

        let dest = student_scratch.join(format!("{}_extracted", tar_name));
        match extract_required(&folder.path.join(&tar_name), required, &dest) {
            Ok(files) => submission.snapshots.push(SubmissionSnapshot {
                timestamp: slot.timestamp,
                source: slot.source,
                files,
            }),
            Err(e) => submission.warnings.push(ImportWarning::student(
                sid,
                WarningKind::PerTarExtraction,
                format!("failed to extract {}: {}", tar_name, e),
            )),
        }
    }

    Ok(submission)
}
