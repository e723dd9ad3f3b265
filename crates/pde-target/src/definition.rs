//! Target definitions, read from TOML.
//!
//! ```toml
//! jre = "JavaSE-17"
//! implicit = ["org.eclipse.core.runtime"]
//! use_all_plugins = false
//!
//! [location]
//! path = "${eclipse_home}"
//! additional = ["${user.home}/extra-bundles"]
//!
//! [[features]]
//! id = "org.eclipse.platform"
//!
//! [[plugins]]
//! id = "org.junit"
//! optional = true
//!
//! [environment]
//! os = "linux"
//! ws = "gtk"
//!
//! [arguments]
//! program = "-consoleLog"
//! vm = "-Xmx1g"
//! ```

use std::path::Path;

use pde_core::TargetEnvironment;
use serde::{Deserialize, Serialize};

use crate::TargetError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDefinition {
    #[serde(default)]
    pub location: TargetLocation,

    #[serde(default)]
    pub use_all_plugins: bool,

    #[serde(default)]
    pub features: Vec<TargetFeature>,

    #[serde(default)]
    pub plugins: Vec<TargetPlugin>,

    #[serde(default)]
    pub environment: TargetEnvironmentSpec,

    #[serde(default)]
    pub arguments: TargetArguments,

    /// Execution environment or VM install name.
    #[serde(default)]
    pub jre: Option<String>,

    /// Implicit plug-in ids added to every classpath.
    #[serde(default)]
    pub implicit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetLocation {
    /// Platform home; may contain `${...}` variables. Ignored when `use_default` is set.
    #[serde(default)]
    pub path: Option<String>,

    /// Use the configured eclipse home.
    #[serde(default)]
    pub use_default: bool,

    #[serde(default)]
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetFeature {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetPlugin {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEnvironmentSpec {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub ws: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub nl: Option<String>,
}

impl TargetEnvironmentSpec {
    /// `base` with every value this target pins replaced.
    pub fn apply_to(&self, mut base: TargetEnvironment) -> TargetEnvironment {
        let pins = [
            (&self.os, &mut base.os),
            (&self.ws, &mut base.ws),
            (&self.arch, &mut base.arch),
            (&self.nl, &mut base.nl),
        ];
        for (pinned, slot) in pins {
            if let Some(value) = pinned {
                *slot = value.clone();
            }
        }
        base
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetArguments {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub vm: Option<String>,
}

impl TargetDefinition {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, TargetError> {
        let text = std::fs::read_to_string(path).map_err(|source| TargetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| TargetError::Definition {
            path: path.to_path_buf(),
            source,
        })
    }
}
