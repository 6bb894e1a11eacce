//! Importer for `submissions/<student>/<timestamp>/<files>` archives
//!
//! Files are used in place; there is nothing to extract.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use markbook_core::errors::ImportError;
use markbook_core::{
    ImportWarning, RequiredFileSet, SnapshotSource, StudentSubmission, SubmissionSnapshot,
    WarningKind,
};

use crate::importer::{ImportFormat, Scan, SubmissionImporter};
use crate::layout::{is_hidden, list_files, student_folders, unwrap_single_dir, StudentFolder};

pub const SUBMISSIONS_DIR: &str = "submissions";
pub const TEAMS_FILE: &str = "teams.json";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub struct FolderTimestampImporter {
    required: RequiredFileSet,
}

impl FolderTimestampImporter {
    pub fn new(required: RequiredFileSet) -> Self {
        Self { required }
    }
}

/// Parse a snapshot directory name as a UTC instant
pub fn parse_folder_timestamp(name: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(name, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl SubmissionImporter for FolderTimestampImporter {
    fn format(&self) -> ImportFormat {
        ImportFormat::FolderTimestamp
    }

    fn scan(&self, unpacked: &Path, _scratch: &Path) -> Result<Scan, ImportError> {
        let top = if unpacked.join(SUBMISSIONS_DIR).is_dir() {
            unpacked.to_path_buf()
        } else {
            unwrap_single_dir(unpacked)
        };

        if top.join(TEAMS_FILE).exists() {
            return Err(ImportError::UnsupportedLayout {
                layout: "team submissions".to_string(),
                detail: format!("{} found at archive top level", TEAMS_FILE),
            });
        }

        let root = top.join(SUBMISSIONS_DIR);
        if !root.is_dir() {
            return Err(ImportError::FormatDiscovery {
                reason: format!("no {} folder found in archive", SUBMISSIONS_DIR),
            });
        }

        let (folders, warnings) = student_folders(&root)?;
        let required = self.required.clone();
        let students = folders
            .into_iter()
            .map(move |folder| import_student(&folder, &required));

        Ok(Scan {
            root,
            warnings,
            students: Box::new(students),
        })
    }
}

fn snapshot_dirs(folder: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type()?.is_dir() {
            continue;
        }
        dirs.push((name, entry.path()));
    }
    dirs.sort();
    Ok(dirs)
}

fn import_student(
    folder: &StudentFolder,
    required: &RequiredFileSet,
) -> Result<StudentSubmission, ImportError> {
    let sid = &folder.student_id;
    let mut submission = StudentSubmission::new(sid.clone());
    let dirs = snapshot_dirs(&folder.path)
        .map_err(|e| ImportError::student_io(sid, "list snapshot folders", &e))?;

    for (name, path) in dirs {
        let timestamp =
            parse_folder_timestamp(&name).ok_or_else(|| ImportError::InvalidTimestamp {
                student_id: sid.clone(),
                value: name.clone(),
            })?;

        let mut snapshot = SubmissionSnapshot::new(timestamp, SnapshotSource::Directory(name));
        let files = list_files(&path)
            .map_err(|e| ImportError::student_io(sid, "list snapshot files", &e))?;
        for file in files.into_iter().filter(|f| required.contains(f)) {
            let file_path = path.join(&file);
            snapshot.files.insert(file, file_path);
        }
        submission.snapshots.push(snapshot);
    }

    submission.snapshots.sort_by_key(|s| s.timestamp);
    if submission.snapshots.is_empty() {
        submission.warnings.push(ImportWarning::student(
            sid,
            WarningKind::EmptySubmission,
            "no submission folders",
        ));
    }

    Ok(submission)
}
