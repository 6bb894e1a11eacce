//! Importer for tar folders without a usable log
//!
//! Tars are ranked by sequence number with `submission.tar` on top. Each
//! required file comes from the highest-ranked tar that holds it, and the
//! student gets one synthetic snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use markbook_core::errors::ImportError;
use markbook_core::{
    ImportWarning, RequiredFileSet, SnapshotSource, StudentSubmission, SubmissionSnapshot,
    WarningKind,
};

use crate::extract::extract_required;
use crate::importer::{ImportFormat, Scan, SubmissionImporter};
use crate::layout::{
    find_root_by_marker, list_files, numbered_tar, student_folders, StudentFolder, DEFAULT_TAR,
};

pub struct TarHeuristicImporter {
    required: RequiredFileSet,
}

impl TarHeuristicImporter {
    pub fn new(required: RequiredFileSet) -> Self {
        Self { required }
    }
}

impl SubmissionImporter for TarHeuristicImporter {
    fn format(&self) -> ImportFormat {
        ImportFormat::TarHeuristic
    }

    fn scan(&self, unpacked: &Path, scratch: &Path) -> Result<Scan, ImportError> {
        let root = find_root_by_marker(unpacked, DEFAULT_TAR)?;
        let (folders, warnings) = student_folders(&root)?;

        let required = self.required.clone();
        let scratch = scratch.to_path_buf();
        let students = folders
            .into_iter()
            .map(move |folder| import_student(&folder, &required, &scratch));

        Ok(Scan {
            root,
            warnings,
            students: Box::new(students),
        })
    }
}

/// Tar names, highest priority first
pub fn rank_tars(files: &[String]) -> Vec<String> {
    let numbered: BTreeMap<u32, &String> = files
        .iter()
        .filter_map(|f| numbered_tar(f).map(|n| (n, f)))
        .collect();

    let mut ranked = Vec::with_capacity(numbered.len() + 1);
    if files.iter().any(|f| f == DEFAULT_TAR) {
        ranked.push(DEFAULT_TAR.to_string());
    }
    ranked.extend(numbered.into_values().rev().cloned());
    ranked
}

fn import_student(
    folder: &StudentFolder,
    required: &RequiredFileSet,
    scratch: &Path,
) -> Result<StudentSubmission, ImportError> {
    let sid = &folder.student_id;
    let mut submission = StudentSubmission::new(sid.clone());
    let files = list_files(&folder.path)
        .map_err(|e| ImportError::student_io(sid, "list student folder", &e))?;

    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut timestamp: Option<DateTime<Utc>> = None;

    for tar_name in rank_tars(&files) {
        if found.len() == required.len() {
            break;
        }
        let tar_path = folder.path.join(&tar_name);
        let dest = scratch.join(sid.as_str()).join(format!("{}_extracted", tar_name));
        let extracted = match extract_required(&tar_path, required, &dest) {
            Ok(extracted) => extracted,
            Err(e) => {
                submission.warnings.push(ImportWarning::student(
                    sid,
                    WarningKind::PerTarExtraction,
                    format!("failed to extract {}: {}", tar_name, e),
                ));
                continue;
            }
        };

        let mut contributed = false;
        for (name, path) in extracted {
            if found.contains_key(&name) {
                continue;
            }
            if tar_name != DEFAULT_TAR {
                submission.warnings.push(ImportWarning::student(
                    sid,
                    WarningKind::NonDefaultSubstitution,
                    format!("{} taken from {}", name, tar_name),
                ));
            }
            found.insert(name, path);
            contributed = true;
        }

        if contributed && timestamp.is_none() {
            timestamp = Some(tar_mtime(&tar_path).map_err(|e| {
                ImportError::student_io(sid, "stat submission tar", &e)
            })?);
        }
    }

    match timestamp {
        Some(timestamp) => submission.snapshots.push(SubmissionSnapshot {
            timestamp,
            source: SnapshotSource::Synthetic,
            files: found,
        }),
        None => submission.warnings.push(ImportWarning::student(
            sid,
            WarningKind::EmptySubmission,
            "no required files in any archive",
        )),
    }

    Ok(submission)
}

fn tar_mtime(path: &Path) -> std::io::Result<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(fs::metadata(path)?.modified()?))
}
