use serde::{Deserialize, Serialize};

/// Institution identifier of one student, always starting with `z`
///
/// Raw folder names are normalised by prefixing the conventional leading
/// letter when it is absent; a leading upper-case `Z` is lowered so that
/// `Z1234567` and `1234567` name the same student.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    pub const PREFIX: char = 'z';

    /// Normalise a raw identifier, returning `None` for empty input
    pub fn normalize(raw: &str) -> Option<StudentId> {
        let raw = raw.trim();
        let mut chars = raw.chars();
        match chars.next() {
            None => None,
            Some(c) if c.eq_ignore_ascii_case(&Self::PREFIX) => {
                Some(StudentId(format!("{}{}", Self::PREFIX, chars.as_str())))
            }
            Some(_) => Some(StudentId(format!("{}{}", Self::PREFIX, raw))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StudentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StudentId::normalize(&value).ok_or_else(|| "student id must not be empty".to_string())
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}
