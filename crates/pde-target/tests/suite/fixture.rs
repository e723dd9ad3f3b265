use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pde_model::{BundleUniverse, FeatureIndex};
use pde_target::{LoadTargetOperation, VariableResolver};
use tempfile::TempDir;

pub fn write_bundle(dir: &Path, id: &str, version: &str) {
    let location = dir.join(format!("{id}_{version}"));
    fs::create_dir_all(location.join("META-INF")).unwrap();
    fs::write(
        location.join("META-INF/MANIFEST.MF"),
        format!("Manifest-Version: 1.0\nBundle-SymbolicName: {id}\nBundle-Version: {version}\n"),
    )
    .unwrap();
}

pub fn write_feature(root: &Path, id: &str, body: &str) {
    let location = root.join("features").join(format!("{id}_1.0.0"));
    fs::create_dir_all(&location).unwrap();
    fs::write(
        location.join("feature.xml"),
        format!(r#"<feature id="{id}" version="1.0.0">{body}</feature>"#),
    )
    .unwrap();
}

/// An eclipse home with `plugins/` and `features/`, plus an empty workspace.
pub struct Fixture {
    pub dir: TempDir,
    pub universe: Arc<BundleUniverse>,
    pub features: Arc<FeatureIndex>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("eclipse/plugins")).unwrap();
        fs::create_dir_all(dir.path().join("ws")).unwrap();
        Self {
            dir,
            universe: Arc::new(BundleUniverse::new()),
            features: Arc::new(FeatureIndex::new()),
        }
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("eclipse")
    }

    pub fn ws_root(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn bundle(&self, id: &str, version: &str) {
        write_bundle(&self.home().join("plugins"), id, version);
    }

    pub fn variables(&self) -> VariableResolver {
        VariableResolver {
            eclipse_home: Some(self.home()),
            workspace_loc: Some(self.ws_root()),
            user_home: None,
        }
    }

    pub fn operation(&self) -> LoadTargetOperation {
        LoadTargetOperation::new(
            Arc::clone(&self.universe),
            Arc::clone(&self.features),
            self.variables(),
        )
    }

    pub fn enabled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .universe
            .external_models()
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
