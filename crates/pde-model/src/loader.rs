//! Turning bundle and feature locations into descriptors.
//!
//! Loading never fails as a whole. A descriptor file that exists but cannot be parsed becomes an
//! unloaded descriptor and is logged; a location without any descriptor is skipped.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::feature::{FeatureDescriptor, FeatureOrigin};
use crate::feature_index::FeatureIndex;
use crate::plugin::{BundleOrigin, PluginDescriptor};
use crate::universe::BundleUniverse;
use crate::workspace::Workspace;

pub const PLUGINS_DIR: &str = "plugins";
pub const FEATURES_DIR: &str = "features";

/// Everything found under a set of target locations.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub plugins: Vec<PluginDescriptor>,
    pub features: Vec<FeatureDescriptor>,
}

fn load_plugin(location: &Path, origin: BundleOrigin, fallback_id: &str) -> Option<PluginDescriptor> {
    match pde_manifest::load_bundle(location) {
        Ok(Some(description)) => {
            let mut descriptor = PluginDescriptor::from_description(description, origin, location);
            annotate_sources(&mut descriptor);
            Some(descriptor)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(
                target = "pde.model",
                location = %location.display(),
                error = %err,
                "bundle descriptor could not be loaded"
            );
            Some(PluginDescriptor::unloaded(fallback_id, origin, location))
        }
    }
}

/// Records the sibling `<name>src.zip` of every library that has one.
fn annotate_sources(descriptor: &mut PluginDescriptor) {
    if descriptor.is_jar() {
        return;
    }
    let root = descriptor.install_location.clone();
    for library in &mut descriptor.libraries {
        let Some(zip) = source_zip_name(&library.name) else { continue };
        if root.join(&zip).is_file() {
            library.source_annotation = Some(zip);
        }
    }
}

/// `lib/x.jar` -> `lib/xsrc.zip`. Names without an extension have no source zip.
pub fn source_zip_name(library: &str) -> Option<String> {
    let dot = library.rfind('.')?;
    if dot == 0 || library[dot..].contains('/') {
        return None;
    }
    Some(format!("{}src.zip", &library[..dot]))
}

/// Loads the plug-in or fragment descriptor of a workspace project.
pub fn load_workspace_plugin(workspace: &dyn Workspace, project: &str) -> Option<PluginDescriptor> {
    let location = workspace.project_location(project)?;
    let origin = BundleOrigin::Workspace {
        project: project.to_string(),
    };
    load_plugin(&location, origin, project)
}

pub fn load_workspace_feature(workspace: &dyn Workspace, project: &str) -> Option<FeatureDescriptor> {
    let location = workspace.project_location(project)?;
    let origin = FeatureOrigin::Workspace {
        project: project.to_string(),
    };
    load_feature(&location, origin)
}

fn load_feature(location: &Path, origin: FeatureOrigin) -> Option<FeatureDescriptor> {
    match FeatureDescriptor::load(location, origin) {
        Ok(feature) => feature,
        Err(err) => {
            tracing::warn!(
                target = "pde.model",
                location = %location.display(),
                error = %err,
                "feature descriptor could not be loaded"
            );
            None
        }
    }
}

pub fn load_external_plugin(location: &Path) -> Option<PluginDescriptor> {
    let name = if location.is_dir() {
        location.file_name().and_then(|n| n.to_str())
    } else {
        pde_core::fs::file_stem(location)
    };
    let fallback = name.unwrap_or_default().to_string();
    load_plugin(
        location,
        BundleOrigin::External {
            location: location.to_path_buf(),
        },
        &fallback,
    )
}

/// Candidate bundle locations under each root: `<root>/plugins/*` when that directory exists,
/// otherwise the root's own children.
pub fn plugin_locations(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for root in roots {
        let plugins = root.join(PLUGINS_DIR);
        let dir = if plugins.is_dir() { plugins } else { root.clone() };
        match pde_core::fs::read_dir_sorted(&dir) {
            Ok(children) => out.extend(
                children
                    .into_iter()
                    .filter(|child| pde_manifest::has_descriptor(child)),
            ),
            Err(err) => tracing::warn!(
                target = "pde.model",
                dir = %dir.display(),
                error = %err,
                "failed to list bundle directory"
            ),
        }
    }
    out
}

pub fn feature_locations(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for root in roots {
        let dir = root.join(FEATURES_DIR);
        match pde_core::fs::read_dir_sorted(&dir) {
            Ok(children) => out.extend(children.into_iter().filter(|c| c.is_dir())),
            Err(err) => tracing::warn!(
                target = "pde.model",
                dir = %dir.display(),
                error = %err,
                "failed to list feature directory"
            ),
        }
    }
    out
}

/// Scans target locations. Results keep location order.
pub fn scan_target(roots: &[PathBuf]) -> ScanResult {
    let plugins: Vec<PluginDescriptor> = plugin_locations(roots)
        .par_iter()
        .filter_map(|location| load_external_plugin(location))
        .collect();
    let features: Vec<FeatureDescriptor> = feature_locations(roots)
        .par_iter()
        .filter_map(|location| {
            load_feature(
                location,
                FeatureOrigin::External {
                    location: location.clone(),
                },
            )
        })
        .collect();

    tracing::debug!(
        target = "pde.model",
        roots = roots.len(),
        plugins = plugins.len(),
        features = features.len(),
        "scanned target locations"
    );
    ScanResult { plugins, features }
}

/// Loads every open workspace project into the universe and the feature index.
///
/// Universe listeners see a single batch.
pub fn scan_workspace(
    workspace: &dyn Workspace,
    universe: &BundleUniverse,
    features: &FeatureIndex,
) -> usize {
    let _batch = universe.batch();
    let mut loaded = 0;
    for project in workspace.projects() {
        if !workspace.is_open(&project) {
            continue;
        }
        if let Some(plugin) = load_workspace_plugin(workspace, &project) {
            universe.put_workspace(plugin);
            loaded += 1;
        }
        if let Some(feature) = load_workspace_feature(workspace, &project) {
            features.put_workspace(feature);
        }
    }
    loaded
}
