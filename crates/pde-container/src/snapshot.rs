//! Per-project container snapshots on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use pde_classpath::ClasspathEntry;
use pde_storage::{ArtifactKind, StorageError, WriteCompression};
use serde::{Deserialize, Serialize};

/// Bumped whenever [`ClasspathEntry`]'s serialized shape changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

const EXTENSION: &str = "container";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContainerSnapshot {
    project: String,
    entries: Vec<ClasspathEntry>,
}

/// Stores one snapshot file per project under a state directory.
///
/// A missing, unreadable or foreign snapshot reads as absent; it is only a change-detection
/// baseline.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    compression: WriteCompression,
    writes: AtomicUsize,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compression: if compress {
                WriteCompression::Auto { threshold: 4096 }
            } else {
                WriteCompression::None
            },
            writes: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, project: &str) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", sanitize(project)))
    }

    pub fn load(&self, project: &str) -> Option<Vec<ClasspathEntry>> {
        let snapshot: ContainerSnapshot = pde_storage::read_artifact_or_discard(
            &self.path_for(project),
            ArtifactKind::ContainerSnapshot,
            SNAPSHOT_SCHEMA_VERSION,
        )?;
        // Sanitized names can collide; the payload names its owner.
        (snapshot.project == project).then_some(snapshot.entries)
    }

    pub fn save(&self, project: &str, entries: &[ClasspathEntry]) -> Result<(), StorageError> {
        let snapshot = ContainerSnapshot {
            project: project.to_string(),
            entries: entries.to_vec(),
        };
        pde_storage::write_artifact_atomic(
            &self.path_for(project),
            ArtifactKind::ContainerSnapshot,
            SNAPSHOT_SCHEMA_VERSION,
            &snapshot,
            self.compression,
        )?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(
            target = "pde.container",
            project,
            entries = entries.len(),
            "persisted container snapshot"
        );
        Ok(())
    }

    /// Deletes the snapshot of `project`; returns whether one existed.
    pub fn remove(&self, project: &str) -> bool {
        let path = self.path_for(project);
        match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => {
                tracing::warn!(
                    target = "pde.container",
                    path = %path.display(),
                    error = %err,
                    "failed to delete container snapshot"
                );
                false
            }
        }
    }

    /// Number of snapshots written through this store.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn sanitize(project: &str) -> String {
    project
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
