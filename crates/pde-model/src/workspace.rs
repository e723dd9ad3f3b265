use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use pde_core::EntryPath;

/// The resource model the rest of the system reads projects and files through.
///
/// Paths handed to and returned from this trait in [`EntryPath`] form are workspace full paths
/// (`/<project>/<relative>`).
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;

    /// Every project, open or closed, in name order.
    fn projects(&self) -> Vec<String>;

    fn project_location(&self, project: &str) -> Option<PathBuf>;

    fn is_open(&self, project: &str) -> bool;

    fn exists(&self, project: &str) -> bool {
        self.project_location(project).is_some()
    }

    /// Maps a workspace full path onto the file system.
    fn resolve(&self, path: &EntryPath) -> Option<PathBuf> {
        let project = path.first_segment()?;
        let mut location = self.project_location(project)?;
        for segment in path.segments().skip(1) {
            location.push(segment);
        }
        Some(location)
    }

    fn file_exists(&self, path: &EntryPath) -> bool {
        self.resolve(path).is_some_and(|p| p.exists())
    }

    /// Creates the folder at `path` and any missing parents.
    fn create_folder(&self, path: &EntryPath) -> io::Result<()> {
        let location = self.resolve(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no project for {path}"))
        })?;
        fs::create_dir_all(location)
    }

    /// The workspace full path of a file-system location inside one of the projects.
    fn full_path_for(&self, location: &Path) -> Option<EntryPath> {
        let relative = location.strip_prefix(self.root()).ok()?;
        let mut components = relative.components();
        let project = components.next()?.as_os_str().to_str()?;
        if !self.exists(project) {
            return None;
        }
        Some(EntryPath::workspace([project]).append(components.as_path().to_string_lossy()))
    }
}

/// A workspace whose projects are the direct subdirectories of a root directory.
///
/// Directories starting with `.` are metadata, not projects. Open/closed state lives in memory.
#[derive(Debug)]
pub struct FsWorkspace {
    root: PathBuf,
    closed: RwLock<BTreeSet<String>>,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            closed: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn close(&self, project: &str) {
        self.closed.write().insert(project.to_string());
    }

    pub fn open(&self, project: &str) {
        self.closed.write().remove(project);
    }
}

impl Workspace for FsWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn projects(&self) -> Vec<String> {
        let children = match pde_core::fs::read_dir_sorted(&self.root) {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(
                    target = "pde.model",
                    root = %self.root.display(),
                    error = %err,
                    "failed to list workspace projects"
                );
                return Vec::new();
            }
        };
        children
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect()
    }

    fn project_location(&self, project: &str) -> Option<PathBuf> {
        if project.is_empty() || project.starts_with('.') || project.contains(['/', '\\']) {
            return None;
        }
        let location = self.root.join(project);
        location.is_dir().then_some(location)
    }

    fn is_open(&self, project: &str) -> bool {
        self.exists(project) && !self.closed.read().contains(project)
    }
}
