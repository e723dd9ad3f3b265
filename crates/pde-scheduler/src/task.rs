use tokio::sync::oneshot;

use crate::{CancellationToken, TaskError};

/// Handle to a job running on one of the scheduler's blocking pools.
pub struct BlockingTask<T> {
    token: CancellationToken,
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> BlockingTask<T> {
    pub(crate) fn new(
        token: CancellationToken,
        rx: oneshot::Receiver<Result<T, TaskError>>,
    ) -> Self {
        Self { token, rx }
    }

    /// Asks the job to stop; it notices at its next cancellation check.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn join(self) -> Result<T, TaskError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Cancelled),
            result = self.rx => match result {
                Ok(result) => result,
                Err(_) => Err(TaskError::Panicked),
            }
        }
    }

    /// Waits for the job from synchronous code. Must not be called on a runtime thread.
    ///
    /// Unlike [`join`](Self::join) this waits for the job itself to return after a cancel, so
    /// the caller observes whatever the job did before it stopped.
    pub fn join_blocking(self) -> Result<T, TaskError> {
        match self.rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(TaskError::Panicked),
        }
    }
}
