use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

/// The exclusive whole-workspace scheduling rule.
///
/// Whoever holds the guard is the only job mutating workspace-level state: a container
/// resolution pass holds it for its entire run, so no build or other mutating job can observe a
/// half-written classpath.
#[derive(Clone, Default)]
pub struct WorkspaceLock {
    inner: Arc<Mutex<()>>,
}

pub struct WorkspaceLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    holder: &'static str,
}

impl WorkspaceLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, holder: &'static str) -> WorkspaceLockGuard<'_> {
        let guard = self.inner.lock();
        tracing::trace!(target = "pde.scheduler", holder, "workspace lock acquired");
        WorkspaceLockGuard {
            _guard: guard,
            holder,
        }
    }

    pub fn try_acquire_for(
        &self,
        holder: &'static str,
        timeout: Duration,
    ) -> Option<WorkspaceLockGuard<'_>> {
        let guard = self.inner.try_lock_for(timeout)?;
        Some(WorkspaceLockGuard {
            _guard: guard,
            holder,
        })
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

impl Drop for WorkspaceLockGuard<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            target = "pde.scheduler",
            holder = self.holder,
            "workspace lock released"
        );
    }
}
