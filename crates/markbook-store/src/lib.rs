//! Markbook Store - persistence and file-side collaborators
//!
//! Provides:
//! - SQLite schema with checksummed migrations
//! - `SqliteRepo`, which applies one student's plan per transaction
//! - Book storage layout and atomic file copies
//! - SHA-256 content hasher and `pdfinfo` page counter
//! - Mirror providers for remote replication

pub mod db;
pub mod errors;
pub mod files;
pub mod hashing;
pub mod migrations;
pub mod mirror;
pub mod pdf;
pub mod repo;

pub use errors::Result;
pub use files::BookLayout;
pub use hashing::Sha256Hasher;
pub use pdf::PdfInfoPageCounter;
pub use repo::SqliteRepo;
