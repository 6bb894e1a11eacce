use crate::errors::{ImportError, Result};

/// Ordered, de-duplicated list of logical file names a run demands
///
/// Names become path components under a book's storage directory, so they
/// must be plain file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFileSet {
    names: Vec<String>,
}

impl RequiredFileSet {
    /// # Errors
    ///
    /// Returns `InvalidRequiredFiles` if the list is empty or any name is
    /// not a plain file name.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                continue;
            }
            if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
                return Err(ImportError::InvalidRequiredFiles {
                    reason: format!("'{}' is not a plain file name", name),
                });
            }
            if !out.contains(&name) {
                out.push(name);
            }
        }
        if out.is_empty() {
            return Err(ImportError::InvalidRequiredFiles {
                reason: "no file names given".to_string(),
            });
        }
        Ok(Self { names: out })
    }

    /// Parse the comma-separated form accepted by the batch surface
    ///
    /// # Errors
    ///
    /// Same as [`RequiredFileSet::new`].
    pub fn parse_csv(csv: &str) -> Result<Self> {
        Self::new(csv.split(','))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
