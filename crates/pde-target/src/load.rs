//! Switching the active target platform.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use pde_container::ContainerManager;
use pde_model::{loader, BundleUniverse, FeatureDescriptor, FeatureIndex, PluginDescriptor};
use serde::Serialize;

use crate::definition::TargetDefinition;
use crate::preferences::{CheckedPlugins, TargetMode, TargetPreferences};
use crate::variables::VariableResolver;
use crate::TargetError;

/// What a load did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadTargetReport {
    /// The external partition was rebuilt from disk.
    pub reloaded: bool,
    pub platform_path: String,
    pub additional_locations: Vec<String>,
    /// External plug-in ids that were added (reload) or whose enabled flag flipped.
    pub changed: Vec<String>,
    /// Required plug-ins no bundle provides.
    pub missing_plugins: Vec<String>,
    /// Non-optional features that could not be found. Expansion stops at the first one.
    pub missing_features: Vec<String>,
    /// External ids dropped in favour of a workspace plug-in with the same id.
    pub shadowed: Vec<String>,
    pub enabled: usize,
    pub vm_changed: bool,
}

impl LoadTargetReport {
    pub fn is_complete(&self) -> bool {
        self.missing_plugins.is_empty() && self.missing_features.is_empty()
    }
}

/// Plug-in ids a target asks for.
#[derive(Debug, Default)]
struct Selection {
    required: BTreeSet<String>,
    optional: BTreeSet<String>,
    missing_features: Vec<String>,
}

impl Selection {
    fn add(&mut self, id: &str, optional: bool) {
        if optional {
            self.optional.insert(id.to_string());
        } else {
            self.required.insert(id.to_string());
        }
    }

    fn wants(&self, id: &str) -> bool {
        self.required.contains(id) || self.optional.contains(id)
    }
}

/// Loads a [`TargetDefinition`] into the bundle universe and the feature index.
///
/// A changed location set rebuilds the external partition from disk. Otherwise only the
/// enabled flags are recomputed. Either way the preferences are updated to describe the new
/// target.
pub struct LoadTargetOperation {
    universe: Arc<BundleUniverse>,
    features: Arc<FeatureIndex>,
    variables: VariableResolver,
    containers: Option<Arc<ContainerManager>>,
}

impl LoadTargetOperation {
    pub fn new(
        universe: Arc<BundleUniverse>,
        features: Arc<FeatureIndex>,
        variables: VariableResolver,
    ) -> Self {
        Self {
            universe,
            features,
            variables,
            containers: None,
        }
    }

    /// Re-resolves classpath containers after the load.
    pub fn with_containers(mut self, manager: Arc<ContainerManager>) -> Self {
        self.containers = Some(manager);
        self
    }

    pub fn run(
        &self,
        target: &TargetDefinition,
        prefs: &mut TargetPreferences,
    ) -> Result<LoadTargetReport, TargetError> {
        load_environment(target, prefs);
        let vm_changed = load_jre(target, prefs);
        prefs.implicit_dependencies = target.implicit.join(",");

        let platform_path = self.main_location(target)?;
        let additional: Vec<String> = target
            .location
            .additional
            .iter()
            .map(|raw| self.variables.substitute_lenient(raw))
            .collect();

        let reload = prefs.platform_path.as_deref() != Some(platform_path.as_str())
            || prefs.additional_locations != additional;

        let mut report = if reload {
            let report = self.reload(target, &platform_path, &additional);
            prefs.platform_path = Some(platform_path.clone());
            prefs.target_mode = if target.location.use_default {
                TargetMode::UseThis
            } else {
                TargetMode::UseOther
            };
            prefs.additional_locations = additional.clone();
            prefs.remember_platform(&platform_path);
            report
        } else {
            self.recompute_enabled(target)
        };
        report.platform_path = platform_path;
        report.additional_locations = additional;
        report.vm_changed = vm_changed;

        prefs.checked_plugins = self.checked_plugins(target.use_all_plugins, report.enabled);

        tracing::info!(
            target = "pde.target",
            path = %report.platform_path,
            reloaded = report.reloaded,
            changed = report.changed.len(),
            enabled = report.enabled,
            missing_plugins = report.missing_plugins.len(),
            missing_features = report.missing_features.len(),
            "target loaded"
        );

        self.notify_containers(&report);
        Ok(report)
    }

    /// Rebuilds the external partition from previously saved preferences without changing
    /// them. Bundles with the id of a workspace plug-in are left out, so the workspace must be
    /// loaded first. Returns the number of external plug-ins loaded.
    pub fn restore(&self, prefs: &TargetPreferences) -> usize {
        let Some(platform_path) = prefs.platform_path.as_deref() else {
            return 0;
        };
        let roots: Vec<PathBuf> = std::iter::once(platform_path)
            .chain(prefs.additional_locations.iter().map(String::as_str))
            .map(PathBuf::from)
            .collect();
        let scan = loader::scan_target(&roots);
        self.features.set_external(scan.features);

        let workspace_ids = self.workspace_ids();
        let mut plugins = scan.plugins;
        plugins.retain(|p| !workspace_ids.contains(p.id.as_str()));
        for plugin in &mut plugins {
            plugin.enabled = match &prefs.checked_plugins {
                CheckedPlugins::All => true,
                CheckedPlugins::None => false,
                CheckedPlugins::Explicit(ids) => ids.contains(&plugin.id),
            };
        }
        let loaded = self.universe.replace_external(plugins).len();
        tracing::debug!(target = "pde.target", path = platform_path, loaded, "restored target");
        loaded
    }

    fn main_location(&self, target: &TargetDefinition) -> Result<String, TargetError> {
        match target.location.path.as_deref() {
            Some(raw) if !target.location.use_default => self.variables.substitute(raw),
            _ => self
                .variables
                .eclipse_home
                .as_ref()
                .map(|home| home.to_string_lossy().into_owned())
                .ok_or(TargetError::NoDefaultLocation),
        }
    }

    fn reload(
        &self,
        target: &TargetDefinition,
        platform_path: &str,
        additional: &[String],
    ) -> LoadTargetReport {
        let roots: Vec<PathBuf> = std::iter::once(platform_path)
            .chain(additional.iter().map(String::as_str))
            .map(PathBuf::from)
            .collect();
        let scan = loader::scan_target(&roots);
        self.features.set_external(scan.features);

        let selection = self.select(target);
        let workspace_ids = self.workspace_ids();
        let mut plugins: Vec<PluginDescriptor> = scan.plugins;
        for plugin in &mut plugins {
            plugin.enabled = target.use_all_plugins || selection.wants(&plugin.id);
        }

        let mut shadowed: Vec<String> = plugins
            .iter()
            .filter(|p| workspace_ids.contains(p.id.as_str()))
            .map(|p| p.id.clone())
            .collect();
        shadowed.sort();
        shadowed.dedup();
        if !shadowed.is_empty() {
            tracing::debug!(
                target = "pde.target",
                count = shadowed.len(),
                "dropping external plug-ins shadowed by workspace projects"
            );
        }

        plugins.retain(|p| !workspace_ids.contains(p.id.as_str()));

        let provided: HashSet<String> = plugins
            .iter()
            .map(|p| p.id.clone())
            .chain(workspace_ids)
            .collect();
        let enabled = plugins.iter().filter(|p| p.enabled).count();
        let added = self.universe.replace_external(plugins);

        LoadTargetReport {
            reloaded: true,
            changed: added.iter().map(|p| p.id.clone()).collect(),
            missing_plugins: missing(&selection, &provided),
            missing_features: selection.missing_features,
            shadowed,
            enabled,
            ..LoadTargetReport::default()
        }
    }

    fn recompute_enabled(&self, target: &TargetDefinition) -> LoadTargetReport {
        let selection = self.select(target);
        let flipped = self
            .universe
            .update_external_enabled(|p| target.use_all_plugins || selection.wants(&p.id));

        let provided: HashSet<String> = self
            .universe
            .external_models()
            .iter()
            .map(|p| p.id.clone())
            .chain(self.workspace_ids())
            .collect();
        let enabled = self
            .universe
            .external_models()
            .iter()
            .filter(|p| p.enabled)
            .count();

        LoadTargetReport {
            changed: flipped.iter().map(|p| p.id.clone()).collect(),
            missing_plugins: missing(&selection, &provided),
            missing_features: selection.missing_features,
            enabled,
            ..LoadTargetReport::default()
        }
    }

    fn workspace_ids(&self) -> HashSet<String> {
        self.universe
            .workspace_models()
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    /// Active features by id; workspace features win over external ones.
    fn feature_map(&self) -> HashMap<String, Arc<FeatureDescriptor>> {
        let (workspace, external): (Vec<_>, Vec<_>) = self
            .features
            .active_models()
            .into_iter()
            .partition(|f| f.is_workspace());
        let mut map = HashMap::new();
        for feature in external {
            map.entry(feature.id.clone()).or_insert(feature);
        }
        for feature in workspace {
            map.insert(feature.id.clone(), feature);
        }
        map
    }

    fn find_feature(
        &self,
        map: &HashMap<String, Arc<FeatureDescriptor>>,
        id: &str,
        version: Option<&str>,
    ) -> Option<Arc<FeatureDescriptor>> {
        version
            .and_then(|v| self.features.find_feature_model_relaxed(id, v))
            .or_else(|| map.get(id).cloned())
    }

    /// Expands the target's features and collects required and optional plug-in ids.
    ///
    /// Included features are expanded transitively through a work stack; each feature is
    /// expanded once. A feature inherits optionality from the feature that pulled it in.
    fn select(&self, target: &TargetDefinition) -> Selection {
        let map = self.feature_map();
        let mut selection = Selection::default();
        let mut stack: Vec<(Arc<FeatureDescriptor>, bool)> = Vec::new();

        for wanted in &target.features {
            match self.find_feature(&map, &wanted.id, wanted.version.as_deref()) {
                Some(feature) => stack.push((feature, wanted.optional)),
                None if wanted.optional => {}
                None => {
                    tracing::warn!(
                        target = "pde.target",
                        feature = %wanted.id,
                        "target feature is missing"
                    );
                    selection.missing_features.push(wanted.id.clone());
                    break;
                }
            }
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        while let Some((feature, optional)) = stack.pop() {
            if !seen.insert((feature.id.clone(), feature.version.clone())) {
                continue;
            }
            for plugin in &feature.plugins {
                selection.add(&plugin.id, optional || plugin.fragment);
            }
            for child in &feature.includes {
                match self.find_feature(&map, &child.id, child.version.as_deref()) {
                    Some(included) => stack.push((included, optional || child.optional)),
                    None => tracing::debug!(
                        target = "pde.target",
                        feature = %feature.id,
                        included = %child.id,
                        "included feature not found"
                    ),
                }
            }
        }

        for plugin in &target.plugins {
            selection.add(&plugin.id, plugin.optional);
        }
        // Required wins when a plug-in is reached both ways.
        let required = selection.required.clone();
        selection.optional.retain(|id| !required.contains(id));
        selection
    }

    fn checked_plugins(&self, use_all: bool, enabled: usize) -> CheckedPlugins {
        if use_all {
            return CheckedPlugins::All;
        }
        if enabled == 0 {
            return CheckedPlugins::None;
        }
        let mut ids: Vec<String> = self
            .universe
            .external_models()
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        CheckedPlugins::Explicit(ids)
    }

    fn notify_containers(&self, report: &LoadTargetReport) {
        let Some(manager) = &self.containers else { return };
        if report.vm_changed {
            manager.vm_changed();
        } else if report.reloaded || !report.changed.is_empty() {
            manager.request_all();
            manager.schedule();
        }
    }
}

fn missing(selection: &Selection, provided: &HashSet<String>) -> Vec<String> {
    selection
        .required
        .iter()
        .filter(|id| !provided.contains(id.as_str()))
        .cloned()
        .collect()
}

fn load_environment(target: &TargetDefinition, prefs: &mut TargetPreferences) {
    let env = &target.environment;
    prefs.os = env.os.clone();
    prefs.ws = env.ws.clone();
    prefs.arch = env.arch.clone();
    prefs.nl = env.nl.clone();
    prefs.program_args = target.arguments.program.clone();
    prefs.vm_args = target.arguments.vm.clone();
}

/// Stores the target's JRE. Returns whether it changed.
fn load_jre(target: &TargetDefinition, prefs: &mut TargetPreferences) -> bool {
    if prefs.vm_install == target.jre {
        return false;
    }
    prefs.vm_install = target.jre.clone();
    true
}
