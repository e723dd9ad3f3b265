use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use pde_model::{
    BundleUniverse, DeltaProcessor, FeatureIndex, FileChange, FileChangeKind, FsWorkspace,
    ModelChangeEvent, ModelListener,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct Recorder(Mutex<Vec<ModelChangeEvent>>);

impl ModelListener for Recorder {
    fn models_changed(&self, event: &ModelChangeEvent) {
        self.0.lock().push(event.clone());
    }
}

fn write_manifest(project: &Path, name: &str, version: &str) {
    fs::create_dir_all(project.join("META-INF")).unwrap();
    fs::write(
        project.join("META-INF/MANIFEST.MF"),
        format!("Bundle-SymbolicName: {name}\nBundle-Version: {version}\n"),
    )
    .unwrap();
}

struct Fixture {
    dir: tempfile::TempDir,
    workspace: Arc<FsWorkspace>,
    universe: Arc<BundleUniverse>,
    features: Arc<FeatureIndex>,
    processor: DeltaProcessor,
    events: Arc<Recorder>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(FsWorkspace::new(dir.path()));
    let universe = Arc::new(BundleUniverse::new());
    let features = Arc::new(FeatureIndex::new());
    let events = Arc::new(Recorder::default());
    universe.subscribe(events.clone());
    let processor = DeltaProcessor::new(workspace.clone(), universe.clone(), features.clone());
    Fixture {
        dir,
        workspace,
        universe,
        features,
        processor,
        events,
    }
}

#[test]
fn many_file_changes_publish_one_batch() {
    let fx = fixture();
    let root = fx.dir.path();
    write_manifest(&root.join("a"), "a", "1.0.0");
    write_manifest(&root.join("b"), "b", "1.0.0");
    fs::write(root.join("a/build.properties"), "source.. = src/\n").unwrap();

    let summary = fx.processor.process(&[
        FileChange::new(root.join("a/META-INF/MANIFEST.MF"), FileChangeKind::Created),
        FileChange::new(root.join("a/build.properties"), FileChangeKind::Created),
        FileChange::new(root.join("b/META-INF/MANIFEST.MF"), FileChangeKind::Created),
        FileChange::new(root.join("a/src/A.java"), FileChangeKind::Created),
    ]);

    assert_eq!(summary.reloaded, vec!["a", "b"]);
    let events = fx.events.0.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].added.len(), 2);
}

#[test]
fn reload_keeps_identity_and_unparseable_manifest_unloads() {
    let fx = fixture();
    let root = fx.dir.path();
    write_manifest(&root.join("a"), "a", "1.0.0");
    let manifest = root.join("a/META-INF/MANIFEST.MF");
    fx.processor
        .process(&[FileChange::new(&manifest, FileChangeKind::Created)]);
    let before = fx.universe.find_by_project("a").unwrap();

    fs::write(&manifest, "Bundle-Version: 2.0.0\n").unwrap();
    fx.processor
        .process(&[FileChange::new(&manifest, FileChangeKind::Modified)]);
    let after = fx.universe.find_by_project("a").unwrap();

    assert_eq!(before.handle, after.handle);
    assert!(!after.loaded);
    assert_eq!(fx.universe.len(), 1);
    assert!(fx
        .universe
        .find_plugin("a", None, pde_core::MatchRule::None)
        .is_none());
}

#[test]
fn deleted_descriptor_and_closed_project_remove_models() {
    let fx = fixture();
    let root = fx.dir.path();
    write_manifest(&root.join("a"), "a", "1.0.0");
    write_manifest(&root.join("b"), "b", "1.0.0");
    fs::write(
        root.join("b/feature.xml"),
        r#"<feature id="b.feature" version="1.0.0"/>"#,
    )
    .unwrap();
    fx.processor.process(&[
        FileChange::new(root.join("a"), FileChangeKind::Created),
        FileChange::new(root.join("b"), FileChangeKind::Created),
    ]);
    assert_eq!(fx.universe.len(), 2);
    assert!(fx.features.find_feature_model("b.feature", "1.0.0").is_some());

    fs::remove_dir_all(root.join("a/META-INF")).unwrap();
    let summary = fx.processor.process(&[FileChange::new(
        root.join("a/META-INF/MANIFEST.MF"),
        FileChangeKind::Deleted,
    )]);
    assert_eq!(summary.removed, vec!["a"]);

    fx.workspace.close("b");
    let summary = fx.processor.project_gone("b");
    assert_eq!(summary.removed, vec!["b"]);
    assert!(fx.universe.is_empty());
    assert!(fx.features.find_feature_model("b.feature", "1.0.0").is_none());
}
