#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use markbook_core::{ContentHasher, PageCountError, PageCounter, StudentId};

pub fn sid(raw: &str) -> StudentId {
    StudentId::normalize(raw).unwrap()
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Hasher answering from a fixed path -> digest table
#[derive(Default)]
pub struct StubHasher {
    digests: HashMap<PathBuf, String>,
}

impl StubHasher {
    pub fn with(mut self, path: impl Into<PathBuf>, digest: &str) -> Self {
        self.digests.insert(path.into(), digest.to_string());
        self
    }
}

impl ContentHasher for StubHasher {
    fn digest(&self, path: &Path) -> std::io::Result<String> {
        self.digests.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())
        })
    }
}

/// Page counter answering from a fixed table; unknown paths have one page
#[derive(Default)]
pub struct StubCounter {
    counts: HashMap<PathBuf, Result<u32, String>>,
}

impl StubCounter {
    pub fn pages(mut self, path: impl Into<PathBuf>, n: u32) -> Self {
        self.counts.insert(path.into(), Ok(n));
        self
    }

    pub fn broken(mut self, path: impl Into<PathBuf>) -> Self {
        self.counts.insert(path.into(), Err("Syntax Error: Couldn't find trailer dictionary".into()));
        self
    }
}

impl PageCounter for StubCounter {
    fn count_pages(&self, path: &Path) -> Result<u32, PageCountError> {
        match self.counts.get(path) {
            Some(Ok(n)) => Ok(*n),
            Some(Err(reason)) => Err(PageCountError::new(reason.clone())),
            None => Ok(1),
        }
    }
}
