//! Redacting wrapper for secrets carried in configuration
//!
//! Mirror credentials live in `markbook.toml`; wrapping them keeps a
//! `{:?}` of the loaded config safe to log.

use serde::{Deserialize, Deserializer};
use std::fmt;

const REDACTED: &str = "<redacted>";

/// A value whose `Debug` and `Display` never show the contents
///
/// ```
/// use markbook_core_types::Sensitive;
///
/// let key = Sensitive::new("signing-key");
/// assert_eq!(format!("{key:?}"), "<redacted>");
/// assert_eq!(*key.expose(), "signing-key");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret at the point it is consumed, e.g. URL signing
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sensitive<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self)
    }
}
