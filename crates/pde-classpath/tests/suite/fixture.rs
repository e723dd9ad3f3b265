use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pde_classpath::{ClasspathContext, ClasspathSettings, InMemoryJavaModel};
use pde_model::{BundleOrigin, BundleUniverse, FeatureIndex, FsWorkspace, PluginDescriptor};
use tempfile::TempDir;

/// A workspace root, a target directory and a universe over both.
pub struct Fixture {
    pub dir: TempDir,
    pub universe: Arc<BundleUniverse>,
    pub java: Arc<InMemoryJavaModel>,
    pub settings: ClasspathSettings,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ws")).unwrap();
        fs::create_dir_all(dir.path().join("target/plugins")).unwrap();
        Self {
            dir,
            universe: Arc::new(BundleUniverse::new()),
            java: Arc::new(InMemoryJavaModel::new()),
            settings: ClasspathSettings::default(),
        }
    }

    pub fn ws_root(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn target_root(&self) -> PathBuf {
        self.dir.path().join("target/plugins")
    }

    /// Creates the project directory and returns an unregistered descriptor for it.
    pub fn project(&self, id: &str, version: Option<&str>) -> PluginDescriptor {
        let location = self.ws_root().join(id);
        fs::create_dir_all(&location).unwrap();
        PluginDescriptor::plugin(
            id,
            version,
            BundleOrigin::Workspace {
                project: id.to_string(),
            },
        )
        .with_location(location)
    }

    /// Creates an external bundle directory and returns an unregistered descriptor for it.
    pub fn external(&self, id: &str, version: &str) -> PluginDescriptor {
        let location = self.target_root().join(format!("{id}_{version}"));
        fs::create_dir_all(&location).unwrap();
        PluginDescriptor::plugin(
            id,
            Some(version),
            BundleOrigin::External {
                location: location.clone(),
            },
        )
    }

    pub fn touch(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    pub fn write_build_properties(&self, project: &str, text: &str) {
        fs::write(self.ws_root().join(project).join("build.properties"), text).unwrap();
    }

    pub fn ctx(&self) -> ClasspathContext {
        ClasspathContext::new(
            Arc::clone(&self.universe),
            Arc::new(FeatureIndex::new()),
            Arc::new(FsWorkspace::new(self.ws_root())),
            self.java.clone(),
            self.settings.clone(),
        )
    }
}
