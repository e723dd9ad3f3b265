//! Typed bundle description extracted from a manifest or a legacy `plugin.xml`.

use pde_core::{MatchRule, Version};

use crate::header::{parse_clauses, Clause};
use crate::manifest::Manifest;

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const BUNDLE_CLASSPATH: &str = "Bundle-ClassPath";
pub const REQUIRE_BUNDLE: &str = "Require-Bundle";
pub const FRAGMENT_HOST: &str = "Fragment-Host";
pub const REQUIRED_EXECUTION_ENVIRONMENT: &str = "Bundle-RequiredExecutionEnvironment";
pub const REQUIRE_CAPABILITY: &str = "Require-Capability";
pub const ECLIPSE_SYSTEM_BUNDLE: &str = "Eclipse-SystemBundle";
pub const ECLIPSE_SOURCE_BUNDLE: &str = "Eclipse-SourceBundle";
pub const ECLIPSE_PATCH_FRAGMENT: &str = "Eclipse-PatchFragment";
pub const ECLIPSE_EXTENSIBLE_API: &str = "Eclipse-ExtensibleAPI";

/// Which file a description was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorFormat {
    Manifest,
    PluginXml,
    FragmentXml,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySpec {
    pub name: String,
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireSpec {
    pub id: String,
    pub version: Option<String>,
    pub rule: MatchRule,
    pub reexport: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub id: String,
    pub version: Option<String>,
    pub rule: MatchRule,
}

/// Everything the resolver needs to know about one bundle, independent of the file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescription {
    pub format: DescriptorFormat,
    pub symbolic_name: String,
    pub version: Option<String>,
    pub singleton: bool,
    pub host: Option<HostSpec>,
    pub libraries: Vec<LibrarySpec>,
    pub requires: Vec<RequireSpec>,
    pub execution_environments: Vec<String>,
    pub system_bundle: bool,
    pub source_bundle: Option<String>,
    pub patch_fragment: bool,
    pub extensible_api: bool,
}

impl BundleDescription {
    /// Builds a description from manifest headers. Returns `None` without a symbolic name.
    ///
    /// A missing `Bundle-ClassPath` means the bundle root (`.`) is the only library.
    pub fn from_manifest(manifest: &Manifest) -> Option<Self> {
        let name_clause = parse_clauses(manifest.get(BUNDLE_SYMBOLIC_NAME)?)
            .into_iter()
            .next()?;
        let symbolic_name = name_clause.value().to_string();
        if symbolic_name.is_empty() {
            return None;
        }
        let singleton = name_clause
            .directive("singleton")
            .or_else(|| name_clause.attribute("singleton"))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let host = manifest
            .get(FRAGMENT_HOST)
            .and_then(|value| parse_clauses(value).into_iter().next())
            .map(|clause| {
                let (version, rule) = version_constraint(&clause, "bundle-version");
                HostSpec {
                    id: clause.value().to_string(),
                    version,
                    rule,
                }
            });

        let libraries = match manifest.get(BUNDLE_CLASSPATH) {
            Some(value) => parse_clauses(value)
                .into_iter()
                .flat_map(|clause| clause.values.into_iter())
                .map(|name| LibrarySpec {
                    name,
                    exported: true,
                })
                .collect(),
            None => vec![LibrarySpec {
                name: ".".to_string(),
                exported: true,
            }],
        };

        let requires = manifest
            .get(REQUIRE_BUNDLE)
            .map(parse_clauses)
            .unwrap_or_default()
            .into_iter()
            .map(|clause| {
                let (version, rule) = version_constraint(&clause, "bundle-version");
                RequireSpec {
                    id: clause.value().to_string(),
                    version,
                    rule,
                    reexport: clause.directive("visibility") == Some("reexport"),
                    optional: clause.directive("resolution") == Some("optional"),
                }
            })
            .collect();

        let mut execution_environments: Vec<String> = manifest
            .get(REQUIRED_EXECUTION_ENVIRONMENT)
            .map(parse_clauses)
            .unwrap_or_default()
            .iter()
            .map(|c| c.value().to_string())
            .collect();
        if execution_environments.is_empty() {
            execution_environments = manifest
                .get(REQUIRE_CAPABILITY)
                .map(parse_clauses)
                .unwrap_or_default()
                .iter()
                .filter(|c| c.value() == "osgi.ee")
                .filter_map(|c| c.directive("filter"))
                .filter_map(execution_environment_from_filter)
                .collect();
        }

        let flag = |header: &str| {
            manifest
                .get(header)
                .and_then(|v| parse_clauses(v).into_iter().next())
                .is_some_and(|c| c.value().eq_ignore_ascii_case("true"))
        };

        Some(Self {
            format: DescriptorFormat::Manifest,
            symbolic_name,
            version: manifest.get(BUNDLE_VERSION).map(str::to_string),
            singleton,
            host,
            libraries,
            requires,
            execution_environments,
            system_bundle: flag(ECLIPSE_SYSTEM_BUNDLE),
            source_bundle: manifest
                .get(ECLIPSE_SOURCE_BUNDLE)
                .and_then(|v| parse_clauses(v).into_iter().next())
                .map(|c| c.value().to_string()),
            patch_fragment: flag(ECLIPSE_PATCH_FRAGMENT),
            extensible_api: flag(ECLIPSE_EXTENSIBLE_API),
        })
    }

    pub fn is_fragment(&self) -> bool {
        self.host.is_some()
    }
}

fn version_constraint(clause: &Clause, attribute: &str) -> (Option<String>, MatchRule) {
    match clause.attribute(attribute).map(VersionRange::parse) {
        Some(Some(range)) => {
            let (version, rule) = range.to_match();
            (Some(version), rule)
        }
        // An unparseable range still carries a version string; match it literally.
        Some(None) => (clause.attribute(attribute).map(str::to_string), MatchRule::Perfect),
        None => (None, MatchRule::None),
    }
}

/// An OSGi version range: either a bare minimum (`1.2`) or an interval (`[1.2,2.0)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    AtLeast(Version),
    Interval {
        min: Version,
        min_inclusive: bool,
        max: Version,
        max_inclusive: bool,
    },
}

impl VersionRange {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let first = text.chars().next()?;
        if first != '[' && first != '(' {
            return Version::parse(text).ok().map(Self::AtLeast);
        }
        let last = text.chars().last()?;
        if last != ']' && last != ')' {
            return None;
        }
        let body = &text[1..text.len() - 1];
        let (min, max) = body.split_once(',')?;
        Some(Self::Interval {
            min: Version::parse(min).ok()?,
            min_inclusive: first == '[',
            max: Version::parse(max).ok()?,
            max_inclusive: last == ']',
        })
    }

    /// Maps the range onto the closest `(minimum version, match rule)` pair.
    pub fn to_match(&self) -> (String, MatchRule) {
        match self {
            Self::AtLeast(min) => (min.to_string(), MatchRule::GreaterOrEqual),
            Self::Interval {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => {
                let rule = if min == max && *min_inclusive && *max_inclusive {
                    MatchRule::Perfect
                } else if !*max_inclusive
                    && max.qualifier.is_empty()
                    && max.micro == 0
                    && max.major == min.major
                    && min.minor.checked_add(1) == Some(max.minor)
                {
                    MatchRule::Equivalent
                } else if !*max_inclusive
                    && max.qualifier.is_empty()
                    && max.micro == 0
                    && max.minor == 0
                    && min.major.checked_add(1) == Some(max.major)
                {
                    MatchRule::Compatible
                } else {
                    MatchRule::GreaterOrEqual
                };
                (min.to_string(), rule)
            }
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        match self {
            Self::AtLeast(min) => version >= min,
            Self::Interval {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => {
                let above = if *min_inclusive {
                    version >= min
                } else {
                    version > min
                };
                let below = if *max_inclusive {
                    version <= max
                } else {
                    version < max
                };
                above && below
            }
        }
    }
}

/// Converts an `osgi.ee` capability filter such as `(&(osgi.ee=JavaSE)(version=1.8))` to an
/// execution environment id (`JavaSE-1.8`).
pub fn execution_environment_from_filter(filter: &str) -> Option<String> {
    let name = filter_value(filter, "osgi.ee")?;
    let version = filter_value(filter, "version");
    Some(match version {
        Some(version) => execution_environment_id(&name, &version),
        None => name,
    })
}

fn filter_value(filter: &str, key: &str) -> Option<String> {
    let needle = format!("({key}=");
    let start = filter.find(&needle)? + needle.len();
    let end = filter[start..].find(')')? + start;
    Some(filter[start..end].trim().to_string())
}

fn execution_environment_id(name: &str, version: &str) -> String {
    let version = short_version(version);
    match name {
        "JavaSE" => {
            let legacy = matches!(version.as_str(), "1.2" | "1.3" | "1.4" | "1.5");
            if legacy {
                format!("J2SE-{version}")
            } else {
                format!("JavaSE-{version}")
            }
        }
        "CDC/Foundation" => format!("CDC-{version}/Foundation-{version}"),
        other => format!("{other}-{version}"),
    }
}

/// `1.8.0` -> `1.8`, `11.0` -> `11`, `11.0.2` -> `11.0.2`.
fn short_version(version: &str) -> String {
    let mut parts: Vec<&str> = version.split('.').collect();
    while parts.len() > 1 && parts.last() == Some(&"0") {
        let is_legacy_minor = parts.len() == 2 && parts[0] == "1";
        if is_legacy_minor {
            break;
        }
        parts.pop();
    }
    parts.join(".")
}
