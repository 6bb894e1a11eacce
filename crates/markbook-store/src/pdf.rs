//! Page counting through the poppler `pdfinfo` tool

use std::path::{Path, PathBuf};
use std::process::Command;

use markbook_core::{PageCountError, PageCounter};

/// Extract the `Pages:` value from `pdfinfo` output
pub fn parse_pdfinfo_pages(output: &str) -> Option<u32> {
    output
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().last())
        .and_then(|n| n.parse().ok())
}

#[derive(Debug, Clone)]
pub struct PdfInfoPageCounter {
    program: PathBuf,
}

impl PdfInfoPageCounter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PdfInfoPageCounter {
    fn default() -> Self {
        Self::new("pdfinfo")
    }
}

impl PageCounter for PdfInfoPageCounter {
    fn count_pages(&self, path: &Path) -> Result<u32, PageCountError> {
        let output = Command::new(&self.program)
            .arg(path)
            .output()
            .map_err(|e| {
                PageCountError::new(format!("cannot run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PageCountError::new(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_pdfinfo_pages(&stdout)
            .ok_or_else(|| PageCountError::new("no page count in pdfinfo output"))
    }
}
