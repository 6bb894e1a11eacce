//! Streaming SHA-256 content hasher

use std::fs::File;
use std::io::Read;
use std::path::Path;

use markbook_core::ContentHasher;
use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Hex SHA-256 of a file, read in 1 MiB chunks
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn digest(&self, path: &Path) -> std::io::Result<String> {
        sha256_file(path)
    }
}
