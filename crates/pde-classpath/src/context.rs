use std::path::PathBuf;
use std::sync::Arc;

use pde_config::PdeConfig;
use pde_core::TargetEnvironment;
use pde_model::{BundleUniverse, FeatureIndex, Workspace};
use regex::Regex;

use crate::java_model::JavaModel;

/// How dependencies reach the classpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolveMode {
    /// Dependencies live behind the required-plug-ins container and are resolved lazily.
    #[default]
    Dynamic,
    /// Dependencies are written into the raw classpath; external libraries become
    /// `ECLIPSE_HOME`-relative variable entries when possible.
    Explicit,
}

#[derive(Debug, Clone)]
pub struct ClasspathSettings {
    pub test_plugin_pattern: Option<Regex>,
    pub override_compliance: bool,
    pub use_project_stand_ins: bool,
    pub add_source_attachments: bool,
    pub implicit_dependencies: Vec<String>,
    pub environment: TargetEnvironment,
    pub eclipse_home: Option<PathBuf>,
}

impl ClasspathSettings {
    pub fn from_config(config: &PdeConfig) -> Self {
        Self {
            test_plugin_pattern: config.classpath.test_plugin_regex(),
            override_compliance: config.classpath.override_compliance,
            use_project_stand_ins: config.classpath.use_project_stand_ins,
            add_source_attachments: config.classpath.add_source_attachments,
            implicit_dependencies: config.classpath.implicit_dependencies.clone(),
            environment: config.target.environment(),
            eclipse_home: config.target.eclipse_home.clone(),
        }
    }

    pub fn is_test_plugin(&self, project: &str) -> bool {
        self.test_plugin_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(project))
    }
}

impl Default for ClasspathSettings {
    fn default() -> Self {
        Self::from_config(&PdeConfig::default())
    }
}

/// Everything classpath computation reads from, passed explicitly.
#[derive(Clone)]
pub struct ClasspathContext {
    pub universe: Arc<BundleUniverse>,
    pub features: Arc<FeatureIndex>,
    pub workspace: Arc<dyn Workspace>,
    pub java: Arc<dyn JavaModel>,
    pub settings: ClasspathSettings,
}

impl ClasspathContext {
    pub fn new(
        universe: Arc<BundleUniverse>,
        features: Arc<FeatureIndex>,
        workspace: Arc<dyn Workspace>,
        java: Arc<dyn JavaModel>,
        settings: ClasspathSettings,
    ) -> Self {
        Self {
            universe,
            features,
            workspace,
            java,
            settings,
        }
    }
}
