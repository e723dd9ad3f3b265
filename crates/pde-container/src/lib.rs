//! Required-plug-ins container resolution.
//!
//! [`ContainerManager`] owns a queue of projects whose container may be stale. A single worker
//! drains it under the workspace lock, resolves each project, compares the result with the last
//! persisted snapshot and pushes only what changed, in one batch.

mod listener;
mod manager;
mod snapshot;

use pde_classpath::{ClasspathError, JavaModelError};
use pde_storage::StorageError;
use thiserror::Error;

pub use manager::{ContainerManager, ContainerRequest, PassReport, RequestState};
pub use snapshot::{SnapshotStore, SNAPSHOT_SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Classpath(#[from] ClasspathError),
    #[error("failed to persist snapshot: {0}")]
    Storage(#[from] StorageError),
}

/// One project's failure inside a pass.
#[derive(Debug, Error)]
#[error("`{project}`: {cause}")]
pub struct ProjectFailure {
    pub project: String,
    #[source]
    pub cause: FailureCause,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container resolution cancelled")]
    Cancelled,
    #[error("classpath container update failed for `{project}`: {source}")]
    Project {
        project: String,
        #[source]
        source: FailureCause,
    },
    #[error("classpath container update failed for {} projects", .0.len())]
    Multiple(Vec<ProjectFailure>),
    #[error(transparent)]
    JavaModel(#[from] JavaModelError),
}

impl ContainerError {
    /// Projects whose failure this error carries.
    pub fn failed_projects(&self) -> Vec<&str> {
        match self {
            ContainerError::Project { project, .. } => vec![project.as_str()],
            ContainerError::Multiple(failures) => {
                failures.iter().map(|f| f.project.as_str()).collect()
            }
            ContainerError::Cancelled | ContainerError::JavaModel(_) => Vec::new(),
        }
    }
}
