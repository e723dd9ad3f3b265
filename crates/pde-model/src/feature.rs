//! Feature descriptors and `feature.xml` reading.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pde_core::{IdVersion, MatchRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FEATURE_XML: &str = "feature.xml";

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed feature manifest {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureOrigin {
    Workspace { project: String },
    External { location: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePlugin {
    pub id: String,
    pub version: Option<String>,
    pub fragment: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureChild {
    pub id: String,
    pub version: Option<String>,
    pub optional: bool,
}

/// A `<requires><import .../></requires>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureImport {
    pub id: String,
    pub feature: bool,
    pub version: Option<String>,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub id: String,
    pub version: String,
    pub origin: FeatureOrigin,
    pub plugins: Vec<FeaturePlugin>,
    pub includes: Vec<FeatureChild>,
    pub imports: Vec<FeatureImport>,
}

impl FeatureDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>, origin: FeatureOrigin) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            origin,
            plugins: Vec::new(),
            includes: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn idver(&self) -> IdVersion {
        IdVersion::new(&self.id, &self.version)
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self.origin, FeatureOrigin::Workspace { .. })
    }

    /// Has an id and a version and every plug-in and child reference names something.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.version.is_empty()
            && self.plugins.iter().all(|p| !p.id.is_empty())
            && self.includes.iter().all(|c| !c.id.is_empty())
    }

    /// Whether `(id, version)` satisfies one of this feature's plug-in references.
    ///
    /// Feature plug-in entries pin an exact version unless they leave it unspecified.
    pub fn references_plugin(&self, id: &str, version: Option<&str>) -> bool {
        self.plugins.iter().any(|p| {
            let required = p
                .version
                .as_deref()
                .filter(|v| *v != pde_core::Version::UNSPECIFIED);
            pde_core::matches(id, version, &p.id, required, MatchRule::Perfect)
        })
    }

    pub fn parse(text: &str, origin: FeatureOrigin) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        let attr = |node: roxmltree::Node<'_, '_>, name: &str| {
            node.attribute(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let flag = |node: roxmltree::Node<'_, '_>, name: &str| node.attribute(name) == Some("true");

        let mut feature = Self::new(
            attr(root, "id").unwrap_or_default(),
            attr(root, "version").unwrap_or_default(),
            origin,
        );

        for child in root.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "plugin" => feature.plugins.push(FeaturePlugin {
                    id: attr(child, "id").unwrap_or_default(),
                    version: attr(child, "version"),
                    fragment: flag(child, "fragment"),
                    optional: flag(child, "optional"),
                }),
                "includes" => feature.includes.push(FeatureChild {
                    id: attr(child, "id").unwrap_or_default(),
                    version: attr(child, "version"),
                    optional: flag(child, "optional"),
                }),
                "requires" => {
                    for import in child.children().filter(|n| n.has_tag_name("import")) {
                        let (id, is_feature) = match (attr(import, "plugin"), attr(import, "feature")) {
                            (Some(id), _) => (id, false),
                            (None, Some(id)) => (id, true),
                            (None, None) => continue,
                        };
                        feature.imports.push(FeatureImport {
                            id,
                            feature: is_feature,
                            version: attr(import, "version"),
                            rule: import
                                .attribute("match")
                                .map(MatchRule::from_attribute)
                                .unwrap_or_default(),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(feature)
    }

    /// Reads `<dir>/feature.xml`; `Ok(None)` when the directory has none.
    pub fn load(dir: &Path, origin: FeatureOrigin) -> Result<Option<Self>, FeatureError> {
        let path = dir.join(FEATURE_XML);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FeatureError::Io { path, source }),
        };
        Self::parse(&text, origin)
            .map(Some)
            .map_err(|source| FeatureError::Xml { path, source })
    }
}
