//! Remote mirror for book files
//!
//! Providers store files under a remote path (`answer_books/<book>/<file>`)
//! and issue expiring signed URLs of the form
//! `<domain>/<path>?auth_key=<exp>-<rand>-0-<md5(/<path>-exp-rand-0-secret)>`,
//! the CDN "type A" scheme the edge verifies with MD5.

#![allow(clippy::result_large_err)]

use std::fs;
use std::path::{Component, Path, PathBuf};

use markbook_core_types::Sensitive;
use serde::Deserialize;
use md5::{Digest, Md5};

use crate::errors::{io_error, mirror_error, Result};
use crate::files::copy_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorProviderKind {
    /// A local or mounted directory standing in for object storage
    Directory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    pub provider: MirrorProviderKind,
    pub root: PathBuf,
    /// Base URL for issued links, e.g. `https://files.example.edu`
    pub domain: String,
    #[serde(default)]
    pub secret: Sensitive<String>,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
    #[serde(default = "default_expire_time_unit")]
    pub expire_time_unit: u64,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub regions: Vec<String>,
}

fn default_expire_secs() -> u64 {
    3600
}

fn default_expire_time_unit() -> u64 {
    60
}

impl MirrorConfig {
    pub fn is_region_supported(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    /// Expiry instant for a URL issued at `now`, rounded to the time unit
    pub fn expiry_for(&self, now: i64) -> i64 {
        let expire = now + self.expire_secs as i64;
        let unit = self.expire_time_unit as i64;
        if unit <= 0 {
            return expire;
        }
        ((expire as f64 / unit as f64).round() as i64) * unit
    }
}

/// Build the signed URL for `remote_path`
pub fn sign_url(domain: &str, remote_path: &str, secret: &str, expires: i64, rand: &str) -> String {
    let path = format!("/{}", remote_path.trim_start_matches('/'));
    let uid = "0";
    let payload = format!("{}-{}-{}-{}-{}", path, expires, rand, uid, secret);
    let digest = hex::encode(Md5::digest(payload.as_bytes()));
    format!(
        "{}{}?auth_key={}-{}-{}-{}",
        domain.trim_end_matches('/'),
        path,
        expires,
        rand,
        uid,
        digest
    )
}

pub trait MirrorProvider: Send + Sync {
    /// Upload `local_path` to `remote_path`, replacing any previous object
    fn put(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    fn exists(&self, remote_path: &str) -> Result<bool>;

    fn delete(&self, remote_path: &str) -> Result<()>;

    fn get_url(&self, remote_path: &str) -> Result<String>;
}

/// Mirror backed by a directory tree
pub struct DirectoryMirror {
    config: MirrorConfig,
}

impl DirectoryMirror {
    pub fn new(config: MirrorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    fn resolve(&self, remote_path: &str) -> Result<PathBuf> {
        let rel = Path::new(remote_path);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || remote_path.is_empty() {
            return Err(mirror_error("resolve", remote_path, "invalid remote path"));
        }
        Ok(self.config.root.join(rel))
    }
}

impl MirrorProvider for DirectoryMirror {
    fn put(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let target = self.resolve(remote_path)?;
        copy_atomic(local_path, &target)?;
        Ok(())
    }

    fn exists(&self, remote_path: &str) -> Result<bool> {
        Ok(self.resolve(remote_path)?.is_file())
    }

    fn delete(&self, remote_path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(remote_path)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("mirror_delete", e)),
        }
    }

    fn get_url(&self, remote_path: &str) -> Result<String> {
        self.resolve(remote_path)?;
        let expires = self.config.expiry_for(chrono::Utc::now().timestamp());
        let rand = if self.config.randomize {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            "0".to_string()
        };
        Ok(sign_url(
            &self.config.domain,
            remote_path,
            self.config.secret.expose(),
            expires,
            &rand,
        ))
    }
}

/// Construct the provider named by `config`
pub fn build_provider(config: MirrorConfig) -> Box<dyn MirrorProvider> {
    match config.provider {
        MirrorProviderKind::Directory => Box::new(DirectoryMirror::new(config)),
    }
}
