//! Dev-mode weaving for nested launches.
//!
//! When the running platform was itself launched from a workspace, some of its bundles load
//! classes from project output folders listed in its `dev.properties`. A nested launch that
//! targets the same bundles has to keep using those folders. The weaver patches the
//! `Bundle-ClassPath` header and the nested launch's `dev.properties` accordingly, but only for
//! bundles installed at the very location the running platform loaded from a project.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pde_core::EntryPath;
use pde_manifest::Manifest;
use pde_model::PluginDescriptor;
use pde_properties::Properties;

use crate::TargetError;

pub const IGNORE_DOT: &str = "@ignoredot@";
const BUNDLE_CLASSPATH: &str = "Bundle-ClassPath";
const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";

/// A `dev.properties` file: bundle id to comma-separated class folders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevProperties {
    props: Properties,
}

impl DevProperties {
    pub fn parse(text: &str) -> Self {
        Self {
            props: pde_properties::parse(text),
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, TargetError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TargetError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), TargetError> {
        fs::write(path, self.render()).map_err(|source| TargetError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn render(&self) -> String {
        self.props.render()
    }

    pub fn entries(&self, id: &str) -> Option<Vec<String>> {
        if id == IGNORE_DOT {
            return None;
        }
        let value = self.props.get(id)?;
        Some(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn set_entries(&mut self, id: &str, entries: &[String]) {
        self.props.set(id, entries.join(","));
    }

    /// The bundle root (`.`) is not a class folder of dev-mode bundles.
    pub fn ignore_dot(&self) -> bool {
        self.props
            .get(IGNORE_DOT)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn set_ignore_dot(&mut self, ignore: bool) {
        self.props.set(IGNORE_DOT, ignore.to_string());
    }
}

/// The platform this process runs in: its `dev.properties` and the locations it loaded
/// workspace bundles from.
#[derive(Debug, Clone, Default)]
pub struct RunningPlatform {
    dev: DevProperties,
    workspace_bundles: HashMap<String, PathBuf>,
}

impl RunningPlatform {
    pub fn new(dev: DevProperties) -> Self {
        Self {
            dev,
            workspace_bundles: HashMap::new(),
        }
    }

    pub fn with_workspace_bundle(mut self, id: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        self.workspace_bundles.insert(id.into(), location.into());
        self
    }

    /// Reads `dev.properties` and a `bundles.info` list (`id,version,location,level,start`).
    ///
    /// A bundle counts as workspace-loaded when `dev.properties` lists class folders for it.
    /// Relative locations resolve against the directory of `bundles_info`.
    pub fn load(dev_properties: &Path, bundles_info: &Path) -> Result<Self, TargetError> {
        let dev = DevProperties::load(dev_properties)?.unwrap_or_default();
        let text = fs::read_to_string(bundles_info).map_err(|source| TargetError::Io {
            path: bundles_info.to_path_buf(),
            source,
        })?;
        let base = bundles_info.parent().unwrap_or(Path::new(""));

        let mut platform = Self::new(dev);
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let [id, _version, location, ..] = fields.as_slice() else {
                tracing::debug!(target = "pde.target", line, "skipping malformed bundles.info line");
                continue;
            };
            if platform.dev.entries(id).is_none() {
                continue;
            }
            let raw = location.strip_prefix("file:").unwrap_or(*location);
            let path = PathBuf::from(raw);
            let path = if path.is_absolute() { path } else { base.join(path) };
            platform.workspace_bundles.insert(id.to_string(), path);
        }
        Ok(platform)
    }

    pub fn dev_properties(&self) -> &DevProperties {
        &self.dev
    }
}

pub struct TargetWeaver {
    running: Option<RunningPlatform>,
}

impl TargetWeaver {
    /// `None` means the running platform is not in dev mode; weaving is then a no-op.
    pub fn new(running: Option<RunningPlatform>) -> Self {
        Self { running }
    }

    pub fn is_dev(&self) -> bool {
        self.running.is_some()
    }

    /// The running platform's class folders for `id`, if the bundle at `location` is the one it
    /// loaded from a workspace project.
    fn dev_entries(&self, id: &str, location: &Path) -> Option<Vec<String>> {
        let running = self.running.as_ref()?;
        let loaded_from = running.workspace_bundles.get(id)?;
        if !same_location(loaded_from, location) {
            tracing::trace!(
                target = "pde.target",
                bundle = id,
                location = %location.display(),
                "not weaving a bundle from a different location"
            );
            return None;
        }
        running.dev.entries(id)
    }

    /// Prepends the dev class folders to `Bundle-ClassPath`. Returns whether the manifest
    /// changed.
    pub fn weave_manifest(&self, manifest: &mut Manifest, location: &Path) -> bool {
        let Some(id) = manifest
            .get(BUNDLE_SYMBOLIC_NAME)
            .and_then(|v| pde_manifest::parse_clauses(v).into_iter().next())
            .map(|clause| clause.value().to_string())
        else {
            return false;
        };
        let Some(mut woven) = self.dev_entries(&id, location) else {
            return false;
        };

        let ignore_dot = self
            .running
            .as_ref()
            .is_some_and(|r| r.dev.ignore_dot());
        let original = manifest
            .get(BUNDLE_CLASSPATH)
            .map(pde_manifest::parse_clauses)
            .unwrap_or_default();
        let original: Vec<String> = if original.is_empty() {
            vec![".".to_string()]
        } else {
            original.iter().map(|c| c.value().to_string()).collect()
        };
        for library in original {
            if (ignore_dot && library == ".") || woven.contains(&library) {
                continue;
            }
            woven.push(library);
        }

        manifest.set(BUNDLE_CLASSPATH, woven.join(","));
        tracing::debug!(target = "pde.target", bundle = %id, "wove Bundle-ClassPath");
        true
    }

    /// Loads the manifest at `location` and weaves it. `Ok(None)` when nothing changed.
    pub fn weave_bundle(&self, location: &Path) -> Result<Option<Manifest>, TargetError> {
        let Some(mut manifest) = pde_manifest::load_manifest(location)? else {
            return Ok(None);
        };
        Ok(self.weave_manifest(&mut manifest, location).then_some(manifest))
    }

    /// Copies the running platform's class folders into a nested launch's `dev.properties`
    /// for every bundle that passes the location check. Returns the number of entries written.
    pub fn weave_dev_properties(
        &self,
        target: &mut DevProperties,
        bundles: &[Arc<PluginDescriptor>],
    ) -> usize {
        let mut woven = 0;
        for bundle in bundles {
            if let Some(entries) = self.dev_entries(&bundle.id, &bundle.install_location) {
                target.set_entries(&bundle.id, &entries);
                woven += 1;
            }
        }
        if woven > 0 && self.running.as_ref().is_some_and(|r| r.dev.ignore_dot()) {
            target.set_ignore_dot(true);
        }
        woven
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| EntryPath::from_path(&fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()));
    canonical(a) == canonical(b)
}
