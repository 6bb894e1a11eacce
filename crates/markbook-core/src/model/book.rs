use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A stored page as seen by the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: i64,
    pub index: i64,
    /// Path relative to the book's storage directory
    pub file_path: String,
    /// 1-based page number inside a multi-page file
    pub file_index: Option<u32>,
}

/// A page to be inserted; the index is assigned at plan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub index: i64,
    pub file_path: String,
    pub file_index: Option<u32>,
}

/// Snapshot of a persisted book and its pages, read before planning
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingBook {
    pub book_id: i64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub pages: Vec<PageRecord>,
    /// Absolute directory holding the book's files
    pub storage_dir: PathBuf,
}

impl ExistingBook {
    /// Next free page index; indices start at 1
    pub fn next_index(&self) -> i64 {
        self.pages.iter().map(|p| p.index).max().map_or(1, |m| m + 1)
    }

    /// Distinct page files absent from `storage_dir`, in page order
    pub fn missing_files(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for page in &self.pages {
            if !missing.contains(&page.file_path)
                && !self.storage_dir.join(&page.file_path).is_file()
            {
                missing.push(page.file_path.clone());
            }
        }
        missing
    }

    pub fn pages_at(&self, file_path: &str) -> Vec<&PageRecord> {
        self.pages
            .iter()
            .filter(|p| p.file_path == file_path)
            .collect()
    }
}
