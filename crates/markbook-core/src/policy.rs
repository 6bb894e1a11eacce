//! Import policy knobs
//!
//! Constructed once per run (usually from the `[import]` config table) and
//! passed to importers and the planner.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What to do with log entries whose archives were overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwrittenPolicy {
    /// Drop them
    #[default]
    Compact,
    /// Keep a timestamp-only placeholder snapshot with no files
    Audit,
}

impl FromStr for OverwrittenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(OverwrittenPolicy::Compact),
            "audit" => Ok(OverwrittenPolicy::Audit),
            other => Err(format!(
                "unknown overwritten policy '{}' (expected compact or audit)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportPolicy {
    pub overwritten_policy: OverwrittenPolicy,
    /// Accept a lone pre-submission archive, stamped with its mtime
    pub pre_submission_fallback: bool,
    /// Advance `submitted_at` when a newer version has identical content
    pub advance_unchanged_timestamp: bool,
    /// Offset used to read log timestamps; `None` means the host zone
    pub log_utc_offset_minutes: Option<i32>,
    /// Extensions the single-file importer recognises, without the dot
    pub single_file_extensions: Vec<String>,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            overwritten_policy: OverwrittenPolicy::Compact,
            pre_submission_fallback: true,
            advance_unchanged_timestamp: true,
            log_utc_offset_minutes: None,
            single_file_extensions: vec!["pdf".to_string()],
        }
    }
}

impl ImportPolicy {
    /// Whether `file_name` has one of the single-file extensions
    pub fn is_single_file_candidate(&self, file_name: &str) -> bool {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.single_file_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Files split into several pages by the page counter
pub fn is_multi_page(logical_name: &str) -> bool {
    logical_name.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = ImportPolicy::default();
        assert_eq!(policy.overwritten_policy, OverwrittenPolicy::Compact);
        assert!(policy.pre_submission_fallback);
        assert!(policy.advance_unchanged_timestamp);
    }

    #[test]
    fn test_partial_toml_style_deserialize() {
        let policy: ImportPolicy =
            serde_json::from_str(r#"{"overwritten_policy":"audit"}"#).unwrap();
        assert_eq!(policy.overwritten_policy, OverwrittenPolicy::Audit);
        assert_eq!(policy.single_file_extensions, vec!["pdf".to_string()]);
    }

    #[test]
    fn test_single_file_candidate() {
        let policy = ImportPolicy::default();
        assert!(policy.is_single_file_candidate("Report.PDF"));
        assert!(!policy.is_single_file_candidate("notes.txt"));
        assert!(!policy.is_single_file_candidate("pdf"));
    }

    #[test]
    fn test_multi_page_detection() {
        assert!(is_multi_page("a.pdf"));
        assert!(is_multi_page("A.PDF"));
        assert!(!is_multi_page("b.txt"));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("AUDIT".parse::<OverwrittenPolicy>(), Ok(OverwrittenPolicy::Audit));
        assert!("keep".parse::<OverwrittenPolicy>().is_err());
    }
}
