use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionParseError};

/// An `(id, version)` pair used as an index key for features and bundles.
///
/// The version is kept as the raw declared string; two descriptors are only considered the
/// same Idver when both strings are identical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdVersion {
    pub id: String,
    pub version: String,
}

impl IdVersion {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    pub fn parsed_version(&self) -> Result<Version, VersionParseError> {
        Version::parse(&self.version)
    }

    /// The same Idver with the qualifier segment replaced by the literal `qualifier` token.
    ///
    /// Returns `None` when the version does not parse.
    pub fn with_qualifier_token(&self) -> Option<Self> {
        let version = self.parsed_version().ok()?;
        Some(Self {
            id: self.id.clone(),
            version: version.with_qualifier(Version::QUALIFIER_TOKEN).to_string(),
        })
    }
}

impl fmt::Display for IdVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.version)
    }
}
