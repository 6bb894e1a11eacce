//! The importer capability and format selection

use std::path::{Path, PathBuf};
use std::str::FromStr;

use markbook_core::errors::ImportError;
use markbook_core::{ImportPolicy, ImportWarning, RequiredFileSet, StudentSubmission};

use crate::folder_timestamp::FolderTimestampImporter;
use crate::log_versioned::LogVersionedImporter;
use crate::single_file::SingleFileImporter;
use crate::tar_heuristic::TarHeuristicImporter;

/// Lazy per-student results; each item does that student's extraction
pub type StudentStream = Box<dyn Iterator<Item = Result<StudentSubmission, ImportError>>>;

/// Result of locating the student folders in an unpacked archive
pub struct Scan {
    pub root: PathBuf,
    /// Run-level notices found while listing student folders
    pub warnings: Vec<ImportWarning>,
    pub students: StudentStream,
}

pub trait SubmissionImporter {
    fn format(&self) -> ImportFormat;

    /// Locate student folders under `unpacked` and return a lazy stream
    ///
    /// Extracted files go under per-student subdirectories of `scratch`.
    ///
    /// # Errors
    ///
    /// Run-level errors only (`FormatDiscovery`, `UnsupportedLayout`,
    /// `Io`); per-student errors are items of the stream.
    fn scan(&self, unpacked: &Path, scratch: &Path) -> Result<Scan, ImportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportFormat {
    /// Submission log plus default and numbered tars
    #[default]
    LogVersioned,
    /// Default and numbered tars without a usable log
    TarHeuristic,
    /// `submissions/<student>/<timestamp>/<files>`
    FolderTimestamp,
    /// One recognised document per student folder
    SingleFile,
}

impl ImportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFormat::LogVersioned => "log",
            ImportFormat::TarHeuristic => "tar",
            ImportFormat::FolderTimestamp => "folder",
            ImportFormat::SingleFile => "single",
        }
    }

    /// Build the importer for this format
    ///
    /// # Errors
    ///
    /// `InvalidRequiredFiles` if the single-file format is given anything
    /// but exactly one required name.
    pub fn importer(
        self,
        required: RequiredFileSet,
        policy: ImportPolicy,
    ) -> Result<Box<dyn SubmissionImporter>, ImportError> {
        Ok(match self {
            ImportFormat::LogVersioned => Box::new(LogVersionedImporter::new(required, policy)),
            ImportFormat::TarHeuristic => Box::new(TarHeuristicImporter::new(required)),
            ImportFormat::FolderTimestamp => Box::new(FolderTimestampImporter::new(required)),
            ImportFormat::SingleFile => Box::new(SingleFileImporter::new(required, policy)?),
        })
    }
}

impl std::fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "give" | "log-versioned" => Ok(ImportFormat::LogVersioned),
            "tar" | "tar-heuristic" => Ok(ImportFormat::TarHeuristic),
            "folder" | "submit" | "folder-timestamp" => Ok(ImportFormat::FolderTimestamp),
            "single" | "single-file" => Ok(ImportFormat::SingleFile),
            other => Err(format!(
                "unknown format '{}' (expected log, tar, folder or single)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in [
            ImportFormat::LogVersioned,
            ImportFormat::TarHeuristic,
            ImportFormat::FolderTimestamp,
            ImportFormat::SingleFile,
        ] {
            assert_eq!(format.as_str().parse::<ImportFormat>(), Ok(format));
        }
        assert!("csv".parse::<ImportFormat>().is_err());
    }

    #[test]
    fn test_single_file_needs_one_name() {
        let required = RequiredFileSet::parse_csv("a.pdf,b.pdf").unwrap();
        let err = ImportFormat::SingleFile
            .importer(required, ImportPolicy::default())
            .err()
            .unwrap();
        assert!(matches!(err, ImportError::InvalidRequiredFiles { .. }));
    }
}
