//! Plug-in and fragment descriptors.

use std::path::{Path, PathBuf};

use pde_core::{IdVersion, MatchRule};
use pde_manifest::{BundleDescription, DescriptorFormat};
use serde::{Deserialize, Serialize};

/// Stable identity of a descriptor inside a [`crate::BundleUniverse`].
///
/// Reloading a workspace descriptor in place keeps its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DescriptorHandle(pub u64);

/// Where a descriptor comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleOrigin {
    /// Backed by a workspace project; editable.
    Workspace { project: String },
    /// Part of the target platform; read-only.
    External { location: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostRef {
    pub id: String,
    pub version: Option<String>,
    pub rule: MatchRule,
}

impl HostRef {
    /// Whether a host `(id, version)` satisfies this reference under its own match rule.
    pub fn accepts(&self, host_id: &str, host_version: Option<&str>) -> bool {
        pde_core::matches(
            host_id,
            host_version,
            &self.id,
            self.version.as_deref(),
            self.rule,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleKind {
    Plugin,
    Fragment(HostRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Library {
    /// Library name as declared; may contain `$ws$`/`$os$`/`$nl$` segments.
    pub name: String,
    pub exported: bool,
    /// Bundle-relative path of a source archive for this library, if one was found.
    pub source_annotation: Option<String>,
}

impl Library {
    pub fn is_default(&self) -> bool {
        self.name == pde_properties::build::DEFAULT_LIBRARY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub id: String,
    pub version: Option<String>,
    pub rule: MatchRule,
    pub reexported: bool,
    pub optional: bool,
}

impl Import {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            rule: MatchRule::None,
            reexported: false,
            optional: false,
        }
    }
}

/// A plug-in or fragment known to the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub handle: DescriptorHandle,
    pub id: String,
    pub version: Option<String>,
    /// Bundle root: a directory or a packaged jar.
    pub install_location: PathBuf,
    pub origin: BundleOrigin,
    pub kind: BundleKind,
    pub libraries: Vec<Library>,
    pub imports: Vec<Import>,
    pub execution_environments: Vec<String>,
    pub enabled: bool,
    /// `false` when the descriptor file exists but could not be parsed.
    pub loaded: bool,
    pub system_bundle: bool,
    pub patch_fragment: bool,
    pub extensible_api: bool,
    pub source_bundle: Option<String>,
    pub legacy: bool,
}

impl PluginDescriptor {
    pub fn plugin(id: impl Into<String>, version: Option<&str>, origin: BundleOrigin) -> Self {
        let install_location = match &origin {
            BundleOrigin::Workspace { project } => PathBuf::from(project),
            BundleOrigin::External { location } => location.clone(),
        };
        Self {
            handle: DescriptorHandle::default(),
            id: id.into(),
            version: version.map(str::to_string),
            install_location,
            origin,
            kind: BundleKind::Plugin,
            libraries: Vec::new(),
            imports: Vec::new(),
            execution_environments: Vec::new(),
            enabled: true,
            loaded: true,
            system_bundle: false,
            patch_fragment: false,
            extensible_api: false,
            source_bundle: None,
            legacy: false,
        }
    }

    pub fn from_description(
        description: BundleDescription,
        origin: BundleOrigin,
        install_location: &Path,
    ) -> Self {
        let kind = match description.host {
            Some(host) => BundleKind::Fragment(HostRef {
                id: host.id,
                version: host.version,
                rule: host.rule,
            }),
            None => BundleKind::Plugin,
        };
        Self {
            handle: DescriptorHandle::default(),
            id: description.symbolic_name,
            version: description.version,
            install_location: install_location.to_path_buf(),
            origin,
            kind,
            libraries: description
                .libraries
                .into_iter()
                .map(|lib| Library {
                    name: lib.name,
                    exported: lib.exported,
                    source_annotation: None,
                })
                .collect(),
            imports: description
                .requires
                .into_iter()
                .map(|req| Import {
                    id: req.id,
                    version: req.version,
                    rule: req.rule,
                    reexported: req.reexport,
                    optional: req.optional,
                })
                .collect(),
            execution_environments: description.execution_environments,
            enabled: true,
            loaded: true,
            system_bundle: description.system_bundle,
            patch_fragment: description.patch_fragment,
            extensible_api: description.extensible_api,
            source_bundle: description.source_bundle,
            legacy: description.format != DescriptorFormat::Manifest,
        }
    }

    /// A placeholder for a descriptor file that exists but failed to parse.
    pub fn unloaded(id: impl Into<String>, origin: BundleOrigin, install_location: &Path) -> Self {
        let mut descriptor = Self::plugin(id, None, origin);
        descriptor.install_location = install_location.to_path_buf();
        descriptor.loaded = false;
        descriptor
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.install_location = location.into();
        self
    }

    pub fn with_library(mut self, name: &str) -> Self {
        self.libraries.push(Library {
            name: name.to_string(),
            exported: true,
            source_annotation: None,
        });
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_host(mut self, host: HostRef) -> Self {
        self.kind = BundleKind::Fragment(host);
        self
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self.origin, BundleOrigin::Workspace { .. })
    }

    pub fn project(&self) -> Option<&str> {
        match &self.origin {
            BundleOrigin::Workspace { project } => Some(project),
            BundleOrigin::External { .. } => None,
        }
    }

    pub fn host(&self) -> Option<&HostRef> {
        match &self.kind {
            BundleKind::Fragment(host) => Some(host),
            BundleKind::Plugin => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.host().is_some()
    }

    /// Loaded and enabled; only these take part in resolution.
    pub fn is_resolvable(&self) -> bool {
        self.loaded && self.enabled
    }

    pub fn idver(&self) -> IdVersion {
        IdVersion::new(&self.id, self.version.as_deref().unwrap_or_default())
    }

    /// The install location is a packaged jar rather than a directory.
    pub fn is_jar(&self) -> bool {
        self.install_location
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jar"))
    }

    pub fn matches(&self, id: &str, version: Option<&str>, rule: MatchRule) -> bool {
        pde_core::matches(&self.id, self.version.as_deref(), id, version, rule)
    }
}
