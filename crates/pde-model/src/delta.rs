//! Workspace file-change processing.
//!
//! Raw file events are categorised per project and applied to the universe and the feature index
//! in one pass, so universe listeners receive a single merged batch however many files moved.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pde_core::IdVersion;

use crate::feature::FEATURE_XML;
use crate::feature_index::FeatureIndex;
use crate::loader;
use crate::universe::BundleUniverse;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The files whose changes matter to the models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeCategory {
    /// The project directory itself appeared or went away.
    Project,
    Manifest,
    PluginXml,
    FragmentXml,
    BuildProperties,
    FeatureXml,
}

impl ChangeCategory {
    fn affects_plugin(self) -> bool {
        !matches!(self, ChangeCategory::FeatureXml)
    }

    fn affects_feature(self) -> bool {
        matches!(self, ChangeCategory::Project | ChangeCategory::FeatureXml)
    }
}

/// Maps a changed path to its project and category. Unrelated files give `None`.
pub fn categorize(workspace_root: &Path, path: &Path) -> Option<(String, ChangeCategory)> {
    let relative = path.strip_prefix(workspace_root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let (project, rest) = parts.split_first()?;
    if project.starts_with('.') {
        return None;
    }
    let category = match rest {
        [] => ChangeCategory::Project,
        ["META-INF", "MANIFEST.MF"] => ChangeCategory::Manifest,
        [name] if *name == pde_manifest::PLUGIN_XML => ChangeCategory::PluginXml,
        [name] if *name == pde_manifest::FRAGMENT_XML => ChangeCategory::FragmentXml,
        [name] if *name == pde_properties::build::FILE_NAME => ChangeCategory::BuildProperties,
        [name] if *name == FEATURE_XML => ChangeCategory::FeatureXml,
        _ => return None,
    };
    Some((project.to_string(), category))
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    /// Projects whose plug-in descriptor was (re)loaded.
    pub reloaded: Vec<String>,
    /// Projects whose plug-in descriptor went away.
    pub removed: Vec<String>,
    /// Feature Idvers whose visibility was recomputed.
    pub features: BTreeSet<IdVersion>,
}

impl DeltaSummary {
    pub fn is_empty(&self) -> bool {
        self.reloaded.is_empty() && self.removed.is_empty() && self.features.is_empty()
    }
}

/// Applies workspace file changes to the models.
pub struct DeltaProcessor {
    workspace: Arc<dyn Workspace>,
    universe: Arc<BundleUniverse>,
    features: Arc<FeatureIndex>,
}

impl DeltaProcessor {
    pub fn new(
        workspace: Arc<dyn Workspace>,
        universe: Arc<BundleUniverse>,
        features: Arc<FeatureIndex>,
    ) -> Self {
        Self {
            workspace,
            universe,
            features,
        }
    }

    pub fn process(&self, changes: &[FileChange]) -> DeltaSummary {
        let mut by_project: BTreeMap<String, BTreeSet<ChangeCategory>> = BTreeMap::new();
        for change in changes {
            if let Some((project, category)) = categorize(self.workspace.root(), &change.path) {
                by_project.entry(project).or_default().insert(category);
            }
        }

        let mut summary = DeltaSummary::default();
        if by_project.is_empty() {
            return summary;
        }

        let _batch = self.universe.batch();
        for (project, categories) in &by_project {
            self.apply_project(project, categories, &mut summary);
        }

        tracing::debug!(
            target = "pde.model",
            changes = changes.len(),
            projects = by_project.len(),
            reloaded = summary.reloaded.len(),
            removed = summary.removed.len(),
            "processed workspace delta"
        );
        summary
    }

    /// Handles a project being closed or deleted outside of file events.
    pub fn project_gone(&self, project: &str) -> DeltaSummary {
        let mut summary = DeltaSummary::default();
        let _batch = self.universe.batch();
        self.drop_project(project, &mut summary);
        summary
    }

    fn apply_project(
        &self,
        project: &str,
        categories: &BTreeSet<ChangeCategory>,
        summary: &mut DeltaSummary,
    ) {
        if !self.workspace.is_open(project) {
            self.drop_project(project, summary);
            return;
        }

        if categories.iter().any(|c| c.affects_plugin()) {
            match loader::load_workspace_plugin(self.workspace.as_ref(), project) {
                Some(descriptor) => {
                    self.universe.put_workspace(descriptor);
                    summary.reloaded.push(project.to_string());
                }
                None => {
                    if self.universe.remove_workspace(project).is_some() {
                        summary.removed.push(project.to_string());
                    }
                }
            }
        }

        if categories.iter().any(|c| c.affects_feature()) {
            let affected = match loader::load_workspace_feature(self.workspace.as_ref(), project) {
                Some(feature) => self.features.put_workspace(feature),
                None => self.features.remove_workspace(project),
            };
            summary.features.extend(affected);
        }
    }

    fn drop_project(&self, project: &str, summary: &mut DeltaSummary) {
        if self.universe.remove_workspace(project).is_some() {
            summary.removed.push(project.to_string());
        }
        summary
            .features
            .extend(self.features.remove_workspace(project));
    }
}
