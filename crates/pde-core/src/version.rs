//! Bundle versions, match rules and the version matcher shared by plug-in and feature lookups.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dotted `major.minor.micro.qualifier` version.
///
/// Missing numeric segments default to `0` and a missing qualifier is the empty string, so
/// `1.2` and `1.2.0` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("empty version")]
    Empty,
    #[error("too many segments in version `{0}`")]
    TooManySegments(String),
    #[error("invalid numeric segment `{segment}` in version `{version}`")]
    InvalidNumber { version: String, segment: String },
    #[error("invalid qualifier `{qualifier}` in version `{version}`")]
    InvalidQualifier { version: String, qualifier: String },
}

impl Version {
    /// The sentinel used by feature references that do not pin a version.
    pub const UNSPECIFIED: &'static str = "0.0.0";

    /// Token substituted for the qualifier when matching development builds.
    pub const QUALIFIER_TOKEN: &'static str = "qualifier";

    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let segments: Vec<&str> = text.split('.').collect();
        if segments.len() > 4 {
            return Err(VersionParseError::TooManySegments(text.to_string()));
        }

        let number = |idx: usize| -> Result<u32, VersionParseError> {
            match segments.get(idx) {
                None => Ok(0),
                Some(segment) => {
                    segment
                        .parse::<u32>()
                        .map_err(|_| VersionParseError::InvalidNumber {
                            version: text.to_string(),
                            segment: (*segment).to_string(),
                        })
                }
            }
        };

        let major = number(0)?;
        let minor = number(1)?;
        let micro = number(2)?;

        let qualifier = match segments.get(3) {
            None => String::new(),
            Some(q) => {
                let valid = !q.is_empty()
                    && q.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(VersionParseError::InvalidQualifier {
                        version: text.to_string(),
                        qualifier: (*q).to_string(),
                    });
                }
                (*q).to_string()
            }
        };

        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }

    pub fn with_qualifier(&self, qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            ..self.clone()
        }
    }

    /// Same major version and not older than `required`.
    pub fn is_compatible_with(&self, required: &Version) -> bool {
        self.major == required.major && self >= required
    }

    /// Same `major.minor` and not older than `required`.
    pub fn is_equivalent_to(&self, required: &Version) -> bool {
        self.major == required.major && self.minor == required.minor && self >= required
    }

    /// All four segments equal.
    pub fn is_perfect(&self, required: &Version) -> bool {
        self == required
    }

    pub fn is_greater_or_equal(&self, required: &Version) -> bool {
        self >= required
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// How a dependency constrains the version of the bundle or feature it names.
///
/// The integer codes are part of the persisted/exchanged format and must stay stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum MatchRule {
    #[default]
    None = 0,
    Equivalent = 1,
    Compatible = 2,
    Perfect = 3,
    GreaterOrEqual = 4,
}

impl MatchRule {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Equivalent,
            2 => Self::Compatible,
            3 => Self::Perfect,
            4 => Self::GreaterOrEqual,
            _ => return None,
        })
    }

    /// Parses the `match` attribute spelling used by `plugin.xml` and `feature.xml`.
    ///
    /// Unknown spellings map to [`MatchRule::None`].
    pub fn from_attribute(value: &str) -> Self {
        match value.trim() {
            "perfect" => Self::Perfect,
            "equivalent" => Self::Equivalent,
            "compatible" => Self::Compatible,
            "greaterOrEqual" => Self::GreaterOrEqual,
            _ => Self::None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Equivalent => "equivalent",
            Self::Compatible => "compatible",
            Self::Perfect => "perfect",
            Self::GreaterOrEqual => "greaterOrEqual",
        }
    }

    fn is_satisfied(self, candidate: &Version, required: &Version) -> bool {
        match self {
            Self::None | Self::Compatible => candidate.is_compatible_with(required),
            Self::Equivalent => candidate.is_equivalent_to(required),
            Self::Perfect => candidate.is_perfect(required),
            Self::GreaterOrEqual => candidate.is_greater_or_equal(required),
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "equivalent" => Ok(Self::Equivalent),
            "compatible" => Ok(Self::Compatible),
            "perfect" => Ok(Self::Perfect),
            "greaterorequal" | "greater-or-equal" => Ok(Self::GreaterOrEqual),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Self::from_code)
                .ok_or_else(|| format!("unknown match rule `{s}`")),
        }
    }
}

/// Decides whether a candidate `(id, version)` satisfies a requirement under `rule`.
///
/// An absent (or empty) required version accepts any candidate. A present required version
/// rejects a candidate without one. If either version fails to parse the raw strings are
/// compared for equality instead.
pub fn matches(
    candidate_id: &str,
    candidate_version: Option<&str>,
    required_id: &str,
    required_version: Option<&str>,
    rule: MatchRule,
) -> bool {
    if candidate_id != required_id {
        return false;
    }

    let Some(required) = required_version.filter(|v| !v.trim().is_empty()) else {
        return true;
    };
    let Some(candidate) = candidate_version.filter(|v| !v.trim().is_empty()) else {
        return false;
    };

    match (Version::parse(candidate), Version::parse(required)) {
        (Ok(candidate), Ok(required)) => rule.is_satisfied(&candidate, &required),
        _ => candidate == required,
    }
}
