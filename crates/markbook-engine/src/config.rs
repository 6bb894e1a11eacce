//! Application configuration
//!
//! Loaded from TOML. The file is located in priority order: an explicit
//! path, `MARKBOOK_CONFIG`, `./markbook.toml`; compiled defaults apply when
//! none exists. Every key is optional.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use markbook_core::logging_facility::Profile;
use markbook_core::{ExError, ExErrorKind, ImportPolicy};
use markbook_store::mirror::MirrorConfig;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "MARKBOOK_CONFIG";
pub const CONFIG_FILE: &str = "markbook.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Book storage root
    pub data_folder: PathBuf,
    pub db_path: PathBuf,
    pub log_profile: Profile,
    /// Program used to count PDF pages
    pub pdfinfo: PathBuf,
    /// Parent for import scratch directories; the system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
    pub import: ImportPolicy,
    /// Replication is disabled without this section
    pub mirror: Option<MirrorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from(".markbook/data"),
            db_path: PathBuf::from(".markbook/store.db"),
            log_profile: Profile::Development,
            pdfinfo: PathBuf::from("pdfinfo"),
            scratch_dir: None,
            import: ImportPolicy::default(),
            mirror: None,
        }
    }
}

fn config_error(path: Option<&Path>, message: impl Into<String>) -> ExError {
    let err = ExError::new(ExErrorKind::Config)
        .with_op("load_config")
        .with_message(message);
    match path {
        Some(path) => err.with_entity_id(path.display().to_string()),
        None => err,
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// `Config` on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ExError> {
        toml::from_str(text).map_err(|e| config_error(None, e.to_string()))
    }

    /// # Errors
    ///
    /// `Config` if the file cannot be read or parsed.
    pub fn load_file(path: &Path) -> Result<Self, ExError> {
        let text = fs::read_to_string(path)
            .map_err(|e| config_error(Some(path), format!("cannot read config: {}", e)))?;
        toml::from_str(&text).map_err(|e| config_error(Some(path), e.to_string()))
    }

    /// Which config file applies, if any
    pub fn locate(explicit: Option<&Path>, env: Option<OsString>, cwd: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = env.filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let local = cwd.join(CONFIG_FILE);
        local.is_file().then_some(local)
    }

    /// Load from the located file, or defaults when there is none
    ///
    /// # Errors
    ///
    /// `Config` if a located file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ExError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match Self::locate(explicit, std::env::var_os(CONFIG_ENV), &cwd) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markbook_core::OverwrittenPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.db_path, PathBuf::from(".markbook/store.db"));
        assert_eq!(config.import, ImportPolicy::default());
        assert!(config.mirror.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            data_folder = "/srv/markbook"
            db_path = "/srv/markbook/store.db"
            log_profile = "production"

            [import]
            overwritten_policy = "audit"
            log_utc_offset_minutes = 660

            [mirror]
            provider = "directory"
            root = "/mnt/mirror"
            domain = "https://files.example.edu"
            secret = "s3cret"
            regions = ["au"]
            "#,
        )
        .unwrap();

        assert_eq!(config.data_folder, PathBuf::from("/srv/markbook"));
        assert_eq!(config.log_profile, Profile::Production);
        assert_eq!(config.import.overwritten_policy, OverwrittenPolicy::Audit);
        assert_eq!(config.import.log_utc_offset_minutes, Some(660));
        assert!(config.import.pre_submission_fallback);

        let mirror = config.mirror.unwrap();
        assert_eq!(mirror.expire_secs, 3600);
        assert!(mirror.is_region_supported("au"));
        assert!(!format!("{:?}", mirror.secret).contains("s3cret"));
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = AppConfig::from_toml_str("data_dir = \"x\"").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Config);
    }

    #[test]
    fn test_locate_priority() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.toml");

        assert_eq!(
            AppConfig::locate(Some(explicit.as_path()), Some("env.toml".into()), dir.path()),
            Some(explicit)
        );
        assert_eq!(
            AppConfig::locate(None, Some("env.toml".into()), dir.path()),
            Some(PathBuf::from("env.toml"))
        );
        assert_eq!(AppConfig::locate(None, None, dir.path()), None);

        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        assert_eq!(
            AppConfig::locate(None, Some(OsString::new()), dir.path()),
            Some(dir.path().join(CONFIG_FILE))
        );
    }
}
