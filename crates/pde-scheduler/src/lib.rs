//! Background execution for classpath work: a small rayon-backed scheduler, cooperative
//! cancellation, keyed debouncing, progress reporting and the exclusive workspace lock.

mod debouncer;
mod lock;
mod progress;
mod scheduler;
mod task;

pub use debouncer::{DebounceOutcome, KeyedDebouncedHandle, KeyedDebouncer};
pub use lock::{WorkspaceLock, WorkspaceLockGuard};
pub use progress::{Progress, ProgressEvent, ProgressId, ProgressReceiver, ProgressSender};
pub use scheduler::{PoolKind, Scheduler, SchedulerConfig};
pub use task::BlockingTask;
pub use tokio_util::sync::CancellationToken;

use thiserror::Error;

/// Returned by work that noticed its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,
    #[error("task panicked")]
    Panicked,
}

impl From<Cancelled> for TaskError {
    fn from(_: Cancelled) -> Self {
        TaskError::Cancelled
    }
}

/// Polls `token` and returns `Err(Cancelled)` once it fired.
pub fn check_cancelled(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}
