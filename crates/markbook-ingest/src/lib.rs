//! Archive unpacking and per-format submission discovery
//!
//! An importer turns an unpacked archive into a lazy stream of
//! [`StudentSubmission`](markbook_core::StudentSubmission)s. Nothing here
//! touches the store.

pub mod archive;
pub mod extract;
pub mod folder_timestamp;
pub mod importer;
pub mod layout;
pub mod log_versioned;
pub mod single_file;
pub mod tar_heuristic;

pub use archive::{unpack, ArchiveKind};
pub use folder_timestamp::FolderTimestampImporter;
pub use importer::{ImportFormat, Scan, StudentStream, SubmissionImporter};
pub use log_versioned::LogVersionedImporter;
pub use single_file::SingleFileImporter;
pub use tar_heuristic::TarHeuristicImporter;
