use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pde_classpath::{ClasspathContext, ClasspathSettings, InMemoryJavaModel};
use pde_container::{ContainerManager, SnapshotStore};
use pde_model::{BundleOrigin, BundleUniverse, FeatureIndex, FsWorkspace, PluginDescriptor};
use pde_scheduler::{Scheduler, SchedulerConfig, WorkspaceLock};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub universe: Arc<BundleUniverse>,
    pub workspace: Arc<FsWorkspace>,
    pub java: Arc<InMemoryJavaModel>,
    pub scheduler: Scheduler,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ws")).unwrap();
        let workspace = Arc::new(FsWorkspace::new(dir.path().join("ws")));
        Self {
            dir,
            universe: Arc::new(BundleUniverse::new()),
            workspace,
            java: Arc::new(InMemoryJavaModel::new()),
            scheduler: Scheduler::new(SchedulerConfig::default()).unwrap(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn project(&self, id: &str) -> PluginDescriptor {
        let location = self.dir.path().join("ws").join(id);
        fs::create_dir_all(&location).unwrap();
        PluginDescriptor::plugin(
            id,
            Some("1.0.0"),
            BundleOrigin::Workspace {
                project: id.to_string(),
            },
        )
        .with_location(location)
    }

    pub fn manager(&self) -> Arc<ContainerManager> {
        self.manager_with(Arc::clone(&self.java))
    }

    pub fn manager_with(&self, java: Arc<InMemoryJavaModel>) -> Arc<ContainerManager> {
        let ctx = ClasspathContext::new(
            Arc::clone(&self.universe),
            Arc::new(FeatureIndex::new()),
            self.workspace.clone(),
            java,
            ClasspathSettings::default(),
        );
        ContainerManager::new(
            ctx,
            SnapshotStore::new(self.state_dir(), false),
            self.scheduler.clone(),
            WorkspaceLock::new(),
            Duration::from_millis(20),
        )
    }
}

/// Polls `condition` for up to five seconds.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
