//! Latest-file resolution across a student's snapshots

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};

use crate::model::{RequiredFileSet, SnapshotSource, StudentId, SubmissionSnapshot};
use crate::summary::{ImportWarning, WarningKind};

/// One required file and the snapshot it was taken from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub logical_name: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub source: SnapshotSource,
    /// Whether the contributing snapshot is the student's newest
    pub from_latest: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// In required-file order; names found in no snapshot are absent
    pub files: Vec<ResolvedFile>,
    /// Maximum timestamp among contributing files
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, logical_name: &str) -> Option<&ResolvedFile> {
        self.files.iter().find(|f| f.logical_name == logical_name)
    }

    /// Files that came from an older snapshot than the newest one
    pub fn stale_files(&self) -> impl Iterator<Item = &ResolvedFile> {
        self.files.iter().filter(|f| !f.from_latest)
    }

    pub fn staleness_warnings(&self, student_id: &StudentId) -> Vec<ImportWarning> {
        self.stale_files()
            .map(|f| {
                ImportWarning::student(
                    student_id,
                    WarningKind::PartialStaleness,
                    format!(
                        "{} taken from older submission {} at {}",
                        f.logical_name,
                        f.source.label(),
                        f.timestamp.to_rfc3339()
                    ),
                )
            })
            .collect()
    }
}

/// Digits of sub-second precision the book store keeps
pub const STORED_SUBSEC_DIGITS: u16 = 6;

/// Truncate to what the store can hold, so a re-import of the same
/// version compares equal to the stored timestamp
pub fn stored_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(STORED_SUBSEC_DIGITS)
}

/// Recency order: newest first, canonical sources win ties, and among
/// complete ties the later-listed snapshot wins
fn recency(a: (usize, &SubmissionSnapshot), b: (usize, &SubmissionSnapshot)) -> Ordering {
    stored_precision(b.1.timestamp)
        .cmp(&stored_precision(a.1.timestamp))
        .then_with(|| b.1.source.is_canonical().cmp(&a.1.source.is_canonical()))
        .then_with(|| b.0.cmp(&a.0))
}

/// For each required name take the most recent snapshot that contains it
pub fn resolve_files(required: &RequiredFileSet, snapshots: &[SubmissionSnapshot]) -> Resolution {
    let mut ordered: Vec<(usize, &SubmissionSnapshot)> = snapshots.iter().enumerate().collect();
    ordered.sort_by(|a, b| recency(*a, *b));

    let latest = ordered.first().map(|(i, _)| *i);
    let mut resolution = Resolution::default();

    for name in required.iter() {
        let hit = ordered
            .iter()
            .find_map(|(i, snap)| snap.files.get(name).map(|path| (*i, *snap, path)));
        if let Some((i, snap, path)) = hit {
            resolution.files.push(ResolvedFile {
                logical_name: name.to_string(),
                path: path.clone(),
                timestamp: stored_precision(snap.timestamp),
                source: snap.source.clone(),
                from_latest: Some(i) == latest,
            });
        }
    }

    resolution.resolved_at = resolution.files.iter().map(|f| f.timestamp).max();
    resolution
}
