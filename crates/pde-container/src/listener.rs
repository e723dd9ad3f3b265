use std::sync::Weak;

use pde_model::{ModelChangeEvent, ModelListener};

use crate::manager::ContainerManager;

/// Re-queues every workspace project on a universe change and drops snapshots of projects
/// that went away.
///
/// Any descriptor change can alter a dependent's container, and an unchanged result costs
/// only a comparison, so the whole workspace is requested.
pub(crate) struct ContainerListener {
    pub(crate) manager: Weak<ContainerManager>,
}

impl ModelListener for ContainerListener {
    fn models_changed(&self, event: &ModelChangeEvent) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        for project in event.removed.iter().filter_map(|m| m.project()) {
            if manager.context().universe.find_by_project(project).is_none() {
                manager.forget(project);
            }
        }
        let queued = manager.request_all();
        tracing::debug!(
            target = "pde.container",
            added = event.added.len(),
            removed = event.removed.len(),
            changed = event.changed.len(),
            queued,
            "model change queued container updates"
        );
        manager.schedule();
    }
}
