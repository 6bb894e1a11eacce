//! Pull required members out of one submission tar

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use markbook_core::RequiredFileSet;

/// Extract the members of `tar_path` named in `required` into `dest`
///
/// Member names are matched exactly after dropping a leading `./`.
/// Anything else in the tar is ignored.
///
/// # Errors
///
/// Any read or write failure; the caller drops the whole tar in that case.
pub fn extract_required(
    tar_path: &Path,
    required: &RequiredFileSet,
    dest: &Path,
) -> io::Result<BTreeMap<String, PathBuf>> {
    let mut archive = tar::Archive::new(BufReader::new(File::open(tar_path)?));
    let mut extracted = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = {
            let path = entry.path()?;
            let name = path.to_string_lossy();
            name.trim_start_matches("./").to_string()
        };
        if !required.contains(&name) {
            continue;
        }
        fs::create_dir_all(dest)?;
        let out = dest.join(&name);
        entry.unpack(&out)?;
        extracted.insert(name, out);
    }

    Ok(extracted)
}
