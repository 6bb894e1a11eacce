//! On-disk conventions shared by the importers

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use markbook_core::errors::ImportError;
use markbook_core::{ImportWarning, StudentId};
use walkdir::WalkDir;

pub const DEFAULT_TAR: &str = "submission.tar";
pub const PRE_SUBMISSION_TAR: &str = "pre-submission.tar";
pub const LOG_FILE: &str = "log";

/// Dot-files and macOS resource folders
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name == "__MACOSX"
}

/// Sequence number of a `sub<N>.tar` file name
pub fn numbered_tar(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("sub")?.strip_suffix(".tar")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Locate the folder that holds student folders
///
/// The first directory (in name order) containing `marker` is a student
/// folder; its parent is the root.
///
/// # Errors
///
/// `FormatDiscovery` if no file named `marker` sits below a directory of
/// `unpacked`.
pub fn find_root_by_marker(unpacked: &Path, marker: &str) -> Result<PathBuf, ImportError> {
    let found = WalkDir::new(unpacked)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()))
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == marker);

    let Some(entry) = found else {
        return Err(ImportError::FormatDiscovery {
            reason: format!("no {} found in archive", marker),
        });
    };

    entry
        .path()
        .parent()
        .filter(|student_dir| *student_dir != unpacked)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| ImportError::FormatDiscovery {
            reason: format!("{} is not inside a student folder", marker),
        })
}

/// Descend through a lone wrapping directory, if the archive has one
pub fn unwrap_single_dir(unpacked: &Path) -> PathBuf {
    let entries: Vec<_> = match fs::read_dir(unpacked) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .filter(|e| !is_hidden(&e.file_name().to_string_lossy()))
            .collect(),
        Err(_) => return unpacked.to_path_buf(),
    };
    match entries.as_slice() {
        [only] if only.path().is_dir() => only.path(),
        _ => unpacked.to_path_buf(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentFolder {
    pub student_id: StudentId,
    pub path: PathBuf,
}

/// Student folders under `root`, in name order
///
/// Hidden entries are skipped silently. Stray files and folders whose
/// name normalises to an id already seen are skipped with a warning.
///
/// # Errors
///
/// `Io` if `root` cannot be listed.
pub fn student_folders(
    root: &Path,
) -> Result<(Vec<StudentFolder>, Vec<ImportWarning>), ImportError> {
    let mut names: Vec<(String, PathBuf)> = fs::read_dir(root)
        .map_err(|e| ImportError::io("list student folders", &e))?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, _)| !is_hidden(name))
        .collect();
    names.sort();

    let mut folders = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for (name, path) in names {
        if !path.is_dir() {
            warnings.push(ImportWarning::run(format!("skipping unexpected file {}", name)));
            continue;
        }
        let Some(student_id) = StudentId::normalize(&name) else {
            continue;
        };
        if !seen.insert(student_id.clone()) {
            warnings.push(ImportWarning::run(format!(
                "skipping folder {}: duplicate of student {}",
                name, student_id
            )));
            continue;
        }
        folders.push(StudentFolder { student_id, path });
    }

    Ok((folders, warnings))
}

/// Names of the regular files directly inside `dir`, skipping hidden ones
pub fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type()?.is_file() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
