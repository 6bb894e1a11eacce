//! Archive unpacker
//!
//! Accepts zip, plain tar and gzip-compressed tar, recognised by their
//! leading bytes rather than the file name.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use markbook_core::errors::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8; 5] = b"ustar";

fn unpack_error(archive: &Path, reason: impl ToString) -> ImportError {
    ImportError::Unpack {
        archive: archive.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Identify an archive from its header bytes
///
/// # Errors
///
/// Returns `Unpack` if the file cannot be read or matches no known format.
pub fn detect_kind(archive: &Path) -> Result<ArchiveKind, ImportError> {
    let mut file = File::open(archive).map_err(|e| unpack_error(archive, e))?;
    let mut header = [0u8; 512];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(|e| unpack_error(archive, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let header = &header[..filled];

    if header.starts_with(&ZIP_MAGIC) || header.starts_with(&ZIP_EMPTY_MAGIC) {
        return Ok(ArchiveKind::Zip);
    }
    if header.starts_with(&GZIP_MAGIC) {
        return Ok(ArchiveKind::TarGz);
    }
    if header.len() >= USTAR_OFFSET + USTAR_MAGIC.len()
        && &header[USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len()] == USTAR_MAGIC
    {
        return Ok(ArchiveKind::Tar);
    }
    Err(unpack_error(archive, "unrecognised archive format"))
}

/// Extract every entry of `archive` into `target`, preserving relative paths
///
/// `target` is created if missing and must otherwise be empty. Entries whose
/// paths would escape `target` are skipped.
///
/// # Errors
///
/// `TargetNotEmpty` if `target` already holds files; `Unpack` if the
/// archive is unrecognised or corrupt.
pub fn unpack(archive: &Path, target: &Path) -> Result<ArchiveKind, ImportError> {
    fs::create_dir_all(target).map_err(|e| ImportError::io("create extract dir", &e))?;
    let mut listing = fs::read_dir(target).map_err(|e| ImportError::io("read extract dir", &e))?;
    if listing.next().is_some() {
        return Err(ImportError::TargetNotEmpty {
            dir: target.display().to_string(),
        });
    }

    let kind = detect_kind(archive)?;
    let file = File::open(archive).map_err(|e| unpack_error(archive, e))?;

    let result = match kind {
        ArchiveKind::Zip => unpack_zip(file, target),
        ArchiveKind::Tar => tar::Archive::new(BufReader::new(file)).unpack(target),
        ArchiveKind::TarGz => tar::Archive::new(GzDecoder::new(BufReader::new(file))).unpack(target),
    };
    result.map_err(|e| unpack_error(archive, e))?;

    tracing::debug!(archive = %archive.display(), kind = ?kind, "unpacked archive");
    Ok(kind)
}

fn unpack_zip(file: File, target: &Path) -> io::Result<()> {
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let Some(rel) = entry.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!(entry = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let out = target.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut dest = File::create(&out)?;
        io::copy(&mut entry, &mut dest)?;
    }
    Ok(())
}
