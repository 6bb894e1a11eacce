//! Map log entries onto the archives actually present
//!
//! The last entry is always the default tar. The entries just before it,
//! as many as there are numbered tars, map to `sub<N>.tar` by sequence
//! number. Anything older was overwritten on the submission server.
//!
//! Log order is authoritative: a timestamp earlier than its predecessor
//! (a repeated hour at a DST fold) is raised to the predecessor's.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use markbook_core::{OverwrittenPolicy, SnapshotSource};

use super::log::LogEntry;
use crate::layout::DEFAULT_TAR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSlot {
    pub timestamp: DateTime<Utc>,
    pub source: SnapshotSource,
    /// `None` for overwritten placeholders
    pub tar_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionPlan {
    /// Oldest first
    pub slots: Vec<VersionSlot>,
    /// Sequence numbers inside the window whose tar is missing
    pub missing: Vec<u32>,
    /// Entries older than the window
    pub overwritten: usize,
}

fn placeholder(entry: &LogEntry) -> VersionSlot {
    VersionSlot {
        timestamp: entry.timestamp,
        source: SnapshotSource::Overwritten(entry.number),
        tar_name: None,
    }
}

/// Entries with timestamps raised to be non-decreasing in log order
fn monotonic(entries: &[LogEntry]) -> Vec<LogEntry> {
    let mut latest: Option<DateTime<Utc>> = None;
    entries
        .iter()
        .map(|entry| {
            let timestamp = latest.map_or(entry.timestamp, |t| t.max(entry.timestamp));
            latest = Some(timestamp);
            LogEntry {
                number: entry.number,
                timestamp,
            }
        })
        .collect()
}

pub fn resolve_versions(
    entries: &[LogEntry],
    numbered: &BTreeMap<u32, String>,
    has_default: bool,
    policy: OverwrittenPolicy,
) -> VersionPlan {
    let mut plan = VersionPlan::default();
    let entries = monotonic(entries);
    let Some((last, earlier)) = entries.split_last() else {
        return plan;
    };

    let window_start = earlier.len().saturating_sub(numbered.len());
    let (overwritten, window) = earlier.split_at(window_start);
    plan.overwritten = overwritten.len();

    if policy == OverwrittenPolicy::Audit {
        plan.slots.extend(overwritten.iter().map(placeholder));
    }

    for entry in window {
        match numbered.get(&entry.number) {
            Some(name) => plan.slots.push(VersionSlot {
                timestamp: entry.timestamp,
                source: SnapshotSource::NumberedTar(entry.number),
                tar_name: Some(name.clone()),
            }),
            None => {
                plan.missing.push(entry.number);
                if policy == OverwrittenPolicy::Audit {
                    plan.slots.push(placeholder(entry));
                }
            }
        }
    }

    if has_default {
        plan.slots.push(VersionSlot {
            timestamp: last.timestamp,
            source: SnapshotSource::DefaultTar,
            tar_name: Some(DEFAULT_TAR.to_string()),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn entries(numbers: &[u32]) -> Vec<LogEntry> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| LogEntry {
                number: *n,
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
            })
            .collect()
    }

    fn numbered(ns: &[u32]) -> BTreeMap<u32, String> {
        ns.iter().map(|n| (*n, format!("sub{}.tar", n))).collect()
    }

    #[test]
    fn test_two_entries_one_numbered_tar() {
        let log = entries(&[1, 2]);
        let plan = resolve_versions(&log, &numbered(&[1]), true, OverwrittenPolicy::Compact);
        let sources: Vec<_> = plan.slots.iter().map(|s| s.source.clone()).collect();
        assert_eq!(
            sources,
            vec![SnapshotSource::NumberedTar(1), SnapshotSource::DefaultTar]
        );
        assert_eq!(plan.slots[1].timestamp, log[1].timestamp);
    }

    #[test]
    fn test_overwritten_entries_by_policy() {
        let log = entries(&[1, 2, 3, 4]);
        let compact = resolve_versions(&log, &numbered(&[3]), true, OverwrittenPolicy::Compact);
        assert_eq!(compact.slots.len(), 2);
        assert_eq!(compact.overwritten, 2);

        let audit = resolve_versions(&log, &numbered(&[3]), true, OverwrittenPolicy::Audit);
        let sources: Vec<_> = audit.slots.iter().map(|s| s.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                SnapshotSource::Overwritten(1),
                SnapshotSource::Overwritten(2),
                SnapshotSource::NumberedTar(3),
                SnapshotSource::DefaultTar,
            ]
        );
        assert!(audit.slots[0].tar_name.is_none());
    }

    #[test]
    fn test_last_entry_is_default_regardless_of_number() {
        // resubmission after a manual renumbering
        let log = entries(&[5, 6, 1]);
        let plan = resolve_versions(&log, &numbered(&[5, 6]), true, OverwrittenPolicy::Compact);
        assert_eq!(plan.slots.last().unwrap().source, SnapshotSource::DefaultTar);
        assert_eq!(plan.slots.last().unwrap().timestamp, log[2].timestamp);
        assert_eq!(plan.slots.len(), 3);
    }

    #[test]
    fn test_missing_numbered_tar_in_window() {
        let log = entries(&[1, 2, 3]);
        let plan = resolve_versions(&log, &numbered(&[1, 7]), true, OverwrittenPolicy::Compact);
        assert_eq!(plan.missing, vec![2]);
        assert_eq!(plan.slots.len(), 2);
    }

    #[test]
    fn test_no_default_tar_drops_last_entry() {
        let log = entries(&[1, 2]);
        let plan = resolve_versions(&log, &numbered(&[1]), false, OverwrittenPolicy::Compact);
        assert_eq!(plan.slots.len(), 1);
        assert_eq!(plan.slots[0].source, SnapshotSource::NumberedTar(1));
    }

    #[test]
    fn test_out_of_order_timestamp_is_raised_to_predecessor() {
        let mut log = entries(&[1, 2]);
        log[1].timestamp = log[0].timestamp - chrono::Duration::minutes(30);
        let plan = resolve_versions(&log, &numbered(&[1]), true, OverwrittenPolicy::Compact);
        assert_eq!(plan.slots[0].timestamp, log[0].timestamp);
        assert_eq!(plan.slots[1].source, SnapshotSource::DefaultTar);
        assert_eq!(plan.slots[1].timestamp, log[0].timestamp);
    }

    #[test]
    fn test_empty_log() {
        let plan = resolve_versions(&[], &numbered(&[1]), true, OverwrittenPolicy::Audit);
        assert!(plan.slots.is_empty());
    }

    proptest! {
        #[test]
        fn prop_slots_are_chronological_and_default_is_last(
            n_entries in 1usize..8,
            present in prop::collection::btree_set(1u32..8, 0..5),
            audit in any::<bool>(),
        ) {
            let log = entries(&(1..=n_entries as u32).collect::<Vec<_>>());
            let numbered: BTreeMap<u32, String> =
                present.iter().map(|n| (*n, format!("sub{}.tar", n))).collect();
            let policy = if audit { OverwrittenPolicy::Audit } else { OverwrittenPolicy::Compact };

            let plan = resolve_versions(&log, &numbered, true, policy);

            prop_assert_eq!(plan.slots.last().map(|s| s.source.clone()), Some(SnapshotSource::DefaultTar));
            prop_assert!(plan.slots.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            prop_assert!(plan.slots.len() <= log.len());
            if audit {
                prop_assert_eq!(plan.slots.len(), log.len());
            }
            for slot in &plan.slots {
                if let SnapshotSource::NumberedTar(n) = slot.source {
                    prop_assert!(numbered.contains_key(&n));
                }
            }
        }
    }
}
