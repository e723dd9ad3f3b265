//! The Java tooling this crate writes classpaths into.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use pde_core::EntryPath;
use thiserror::Error;

use crate::ee::CompilerOptions;
use crate::entry::ClasspathEntry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JavaModelError {
    #[error("project `{0}` is not a Java project")]
    NotJavaProject(String),
    #[error("java model rejected the update: {0}")]
    Rejected(String),
}

/// One project's resolved required-plug-ins container contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUpdate {
    pub project: String,
    pub entries: Vec<ClasspathEntry>,
}

/// The Java project model.
///
/// Raw classpaths are replaced as a whole; there is no per-entry mutation. Container contents
/// for many projects are pushed in one call.
pub trait JavaModel: Send + Sync {
    fn raw_classpath(&self, project: &str) -> Option<Vec<ClasspathEntry>>;

    /// Defaults to `/<project>/bin`.
    fn output_location(&self, project: &str) -> EntryPath {
        EntryPath::workspace([project, "bin"])
    }

    fn compiler_options(&self, project: &str) -> CompilerOptions;

    fn set_compiler_options(
        &self,
        project: &str,
        options: CompilerOptions,
    ) -> Result<(), JavaModelError>;

    fn set_raw_classpath(
        &self,
        project: &str,
        entries: Vec<ClasspathEntry>,
    ) -> Result<(), JavaModelError>;

    fn container_entries(&self, project: &str) -> Option<Vec<ClasspathEntry>>;

    fn set_container_entries(&self, updates: Vec<ContainerUpdate>) -> Result<(), JavaModelError>;
}

#[derive(Debug, Default)]
struct ProjectState {
    raw: Option<Vec<ClasspathEntry>>,
    options: CompilerOptions,
    container: Option<Vec<ClasspathEntry>>,
    output: Option<EntryPath>,
}

/// A [`JavaModel`] that keeps everything in memory and counts writes.
#[derive(Debug, Default)]
pub struct InMemoryJavaModel {
    projects: RwLock<HashMap<String, ProjectState>>,
    raw_writes: AtomicUsize,
    container_pushes: AtomicUsize,
    reject_containers: AtomicBool,
}

impl InMemoryJavaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_output_location(&self, project: &str, output: EntryPath) {
        self.projects
            .write()
            .entry(project.to_string())
            .or_default()
            .output = Some(output);
    }

    /// Seeds a raw classpath without counting it as a write.
    pub fn seed_raw_classpath(&self, project: &str, entries: Vec<ClasspathEntry>) {
        self.projects
            .write()
            .entry(project.to_string())
            .or_default()
            .raw = Some(entries);
    }

    pub fn raw_writes(&self) -> usize {
        self.raw_writes.load(Ordering::SeqCst)
    }

    /// Number of accepted `set_container_entries` calls, not projects.
    pub fn container_pushes(&self) -> usize {
        self.container_pushes.load(Ordering::SeqCst)
    }

    /// While set, every container push fails with [`JavaModelError::Rejected`].
    pub fn reject_container_pushes(&self, reject: bool) {
        self.reject_containers.store(reject, Ordering::SeqCst);
    }
}

impl JavaModel for InMemoryJavaModel {
    fn raw_classpath(&self, project: &str) -> Option<Vec<ClasspathEntry>> {
        self.projects.read().get(project)?.raw.clone()
    }

    fn output_location(&self, project: &str) -> EntryPath {
        self.projects
            .read()
            .get(project)
            .and_then(|state| state.output.clone())
            .unwrap_or_else(|| EntryPath::workspace([project, "bin"]))
    }

    fn compiler_options(&self, project: &str) -> CompilerOptions {
        self.projects
            .read()
            .get(project)
            .map(|state| state.options.clone())
            .unwrap_or_default()
    }

    fn set_compiler_options(
        &self,
        project: &str,
        options: CompilerOptions,
    ) -> Result<(), JavaModelError> {
        self.projects
            .write()
            .entry(project.to_string())
            .or_default()
            .options = options;
        Ok(())
    }

    fn set_raw_classpath(
        &self,
        project: &str,
        entries: Vec<ClasspathEntry>,
    ) -> Result<(), JavaModelError> {
        self.projects
            .write()
            .entry(project.to_string())
            .or_default()
            .raw = Some(entries);
        self.raw_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn container_entries(&self, project: &str) -> Option<Vec<ClasspathEntry>> {
        self.projects.read().get(project)?.container.clone()
    }

    fn set_container_entries(&self, updates: Vec<ContainerUpdate>) -> Result<(), JavaModelError> {
        if self.reject_containers.load(Ordering::SeqCst) {
            return Err(JavaModelError::Rejected(format!(
                "{} container updates",
                updates.len()
            )));
        }
        let mut projects = self.projects.write();
        for update in updates {
            projects.entry(update.project).or_default().container = Some(update.entries);
        }
        self.container_pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
