//! Book file layout and atomic copies
//!
//! Book files live under `<data_folder>/answer_books/<book_id>/`. The same
//! relative path names the file on the replication mirror.

#![allow(clippy::result_large_err)]

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{io_error, Result};

pub const BOOKS_DIR: &str = "answer_books";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLayout {
    data_folder: PathBuf,
}

impl BookLayout {
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn book_dir(&self, book_id: i64) -> PathBuf {
        self.data_folder.join(BOOKS_DIR).join(book_id.to_string())
    }

    pub fn file_path(&self, book_id: i64, file_path: &str) -> PathBuf {
        self.book_dir(book_id).join(file_path)
    }

    /// Path relative to the data folder, as used by the mirror
    pub fn relative_path(&self, book_id: i64, file_path: &str) -> String {
        format!("{}/{}/{}", BOOKS_DIR, book_id, file_path)
    }

    /// Remove the given files of one book, ignoring ones already gone
    ///
    /// Returns how many files were removed. The book directory is removed
    /// too once it is empty.
    pub fn remove_files(&self, book_id: i64, file_paths: &[String]) -> Result<usize> {
        let mut removed = 0;
        for file_path in file_paths {
            match fs::remove_file(self.file_path(book_id, file_path)) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("remove_book_file", e)),
            }
        }
        let dir = self.book_dir(book_id);
        if fs::read_dir(&dir).map(|mut d| d.next().is_none()).unwrap_or(false) {
            fs::remove_dir(&dir).map_err(|e| io_error("remove_book_dir", e))?;
        }
        Ok(removed)
    }
}

/// Copy `source` to `target` so that `target` never holds a partial file
///
/// Copies into a hidden sibling first and renames it into place, creating
/// parent directories as needed. Returns the number of bytes copied.
pub fn copy_atomic(source: &Path, target: &Path) -> Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_book_dir", e))?;
    }

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = target.with_file_name(format!(".{}.tmp", file_name));

    let bytes = match fs::copy(source, &temp_path) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error("copy_book_file", e));
        }
    };

    fs::rename(&temp_path, target).map_err(|e| io_error("rename_book_file", e))?;

    Ok(bytes)
}
