#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use markbook_core::{
    ExError, ImportPolicy, ImportSummary, NoopReplicator, PageCountError, PageCounter,
    RequiredFileSet,
};
use markbook_engine::{import_archive, ImportContext, ImportRequest};
use markbook_ingest::ImportFormat;
use markbook_store::{db, BookLayout, Sha256Hasher};
use rusqlite::Connection;
use tempfile::TempDir;

pub const MON: &str = "Mon Mar  4 10:00:00 2024";
pub const TUE: &str = "Tue Mar  5 10:00:00 2024";
pub const WED: &str = "Wed Mar  6 10:00:00 2024";

/// Every document has one page
pub struct OnePage;

impl PageCounter for OnePage {
    fn count_pages(&self, _path: &Path) -> Result<u32, PageCountError> {
        Ok(1)
    }
}

pub fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn log(lines: &[(u32, &str)]) -> Vec<u8> {
    lines
        .iter()
        .map(|(n, when)| format!("Submission {}\t{}\tsubmitted\n", n, when))
        .collect::<String>()
        .into_bytes()
}

/// Write an outer tar archive holding `entries`
pub fn write_archive(dest: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut builder = tar::Builder::new(File::create(dest).unwrap());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_slice()).unwrap();
    }
    builder.finish().unwrap();
}

/// A migrated store, a data folder and a place for archives
pub struct TestEnv {
    pub dir: TempDir,
    pub conn: Connection,
    pub layout: BookLayout,
    pub policy: ImportPolicy,
    archives: usize,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let conn = db::open_and_migrate(dir.path().join("store.db")).unwrap();
        let layout = BookLayout::new(dir.path().join("data"));
        Self {
            dir,
            conn,
            layout,
            policy: ImportPolicy {
                log_utc_offset_minutes: Some(0),
                ..ImportPolicy::default()
            },
            archives: 0,
        }
    }

    pub fn archive(&mut self, entries: &[(&str, Vec<u8>)]) -> PathBuf {
        self.archives += 1;
        let path = self.dir.path().join(format!("archive{}.tar", self.archives));
        write_archive(&path, entries);
        path
    }

    pub fn import(
        &mut self,
        task: &str,
        archive: &Path,
        files: &str,
        format: ImportFormat,
    ) -> Result<ImportSummary, ExError> {
        let request = ImportRequest {
            task: task.to_string(),
            archive: archive.to_path_buf(),
            required: RequiredFileSet::parse_csv(files).unwrap(),
            format,
        };
        let scratch = self.dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        let ctx = ImportContext {
            layout: &self.layout,
            policy: &self.policy,
            hasher: &Sha256Hasher,
            counter: &OnePage,
            replicator: &NoopReplicator,
            scratch_parent: Some(scratch),
        };
        import_archive(&request, &mut self.conn, &ctx)
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.dir.path().join("scratch"))
            .unwrap()
            .next()
            .is_none()
    }
}
