#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use markbook_core::{ImportPolicy, RequiredFileSet, StudentSubmission};
use markbook_ingest::{unpack, ImportFormat};
use tempfile::TempDir;

pub const MTIME: u64 = 1_700_000_000;

/// Bytes of a tar holding `files`
pub fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(MTIME);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn log_line(number: u32, when: &str) -> String {
    format!("Submission {}\t{}\tsubmitted a.pdf\n", number, when)
}

enum Entry {
    File { path: String, data: Vec<u8>, mtime: u64 },
    Dir(String),
}

/// An outer archive assembled in memory
#[derive(Default)]
pub struct Fixture {
    entries: Vec<Entry>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.file_at(path, data, MTIME)
    }

    pub fn file_at(mut self, path: &str, data: impl Into<Vec<u8>>, mtime: u64) -> Self {
        self.entries.push(Entry::File {
            path: path.to_string(),
            data: data.into(),
            mtime,
        });
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(Entry::Dir(path.to_string()));
        self
    }

    pub fn write_tar(&self, dest: &Path) {
        let mut builder = tar::Builder::new(File::create(dest).unwrap());
        for entry in &self.entries {
            match entry {
                Entry::File { path, data, mtime } => {
                    let mut header = tar::Header::new_gnu();
                    header.set_size(data.len() as u64);
                    header.set_mode(0o644);
                    header.set_mtime(*mtime);
                    header.set_cksum();
                    builder.append_data(&mut header, path, data.as_slice()).unwrap();
                }
                Entry::Dir(path) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    header.set_mtime(MTIME);
                    header.set_cksum();
                    builder.append_data(&mut header, path, std::io::empty()).unwrap();
                }
            }
        }
        builder.finish().unwrap();
    }

    pub fn write_zip(&self, dest: &Path) {
        let mut zip = zip::ZipWriter::new(File::create(dest).unwrap());
        let options = zip::write::FileOptions::default();
        for entry in &self.entries {
            match entry {
                Entry::File { path, data, .. } => {
                    zip.start_file(path.as_str(), options).unwrap();
                    zip.write_all(data).unwrap();
                }
                Entry::Dir(path) => zip.add_directory(path.as_str(), options).unwrap(),
            }
        }
        zip.finish().unwrap();
    }
}

/// Unpacked archive plus scratch space, removed on drop
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn unpack_tar(fixture: &Fixture) -> Self {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("cohort.tar");
        fixture.write_tar(&archive);
        unpack(&archive, &dir.path().join("unpacked")).unwrap();
        Self { dir }
    }

    pub fn unpack_zip(fixture: &Fixture) -> Self {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("cohort.zip");
        fixture.write_zip(&archive);
        unpack(&archive, &dir.path().join("unpacked")).unwrap();
        Self { dir }
    }

    pub fn unpacked(&self) -> PathBuf {
        self.dir.path().join("unpacked")
    }

    pub fn scratch(&self) -> PathBuf {
        self.dir.path().join("extracted")
    }

    pub fn scan(
        &self,
        format: ImportFormat,
        required: &str,
        policy: ImportPolicy,
    ) -> Vec<Result<StudentSubmission, markbook_core::ImportError>> {
        let required = RequiredFileSet::parse_csv(required).unwrap();
        let importer = format.importer(required, policy).unwrap();
        importer
            .scan(&self.unpacked(), &self.scratch())
            .unwrap()
            .students
            .collect()
    }
}

pub fn utc_policy() -> ImportPolicy {
    ImportPolicy {
        log_utc_offset_minutes: Some(0),
        ..ImportPolicy::default()
    }
}
