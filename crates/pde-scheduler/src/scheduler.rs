use std::sync::Arc;

use rayon::ThreadPool;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, oneshot};

use crate::{task::BlockingTask, CancellationToken, Cancelled, ProgressSender, TaskError};
use crate::progress::DEFAULT_PROGRESS_CHANNEL_CAPACITY;

enum BlockingPool {
    Rayon(ThreadPool),
    Inline,
}

impl BlockingPool {
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            BlockingPool::Rayon(pool) => pool.spawn(job),
            BlockingPool::Inline => job(),
        }
    }
}

fn build_rayon_pool(prefix: &'static str, threads: usize) -> BlockingPool {
    // Thread creation can fail under tight process limits; shrink the pool, then run inline.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return BlockingPool::Rayon(pool),
            Err(_) if threads > 1 => {
                threads = (threads / 2).max(1);
            }
            Err(err) => {
                tracing::warn!(
                    target = "pde.scheduler",
                    pool = prefix,
                    error = %err,
                    "no worker threads available; running jobs inline"
                );
                return BlockingPool::Inline;
            }
        }
    }
}

fn build_timer_runtime() -> std::io::Result<Runtime> {
    match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .thread_name("pde-timer")
        .build()
    {
        Ok(rt) => Ok(rt),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Short, parallel work such as scanning bundle locations.
    Compute,
    /// Long-running jobs such as a container resolution pass.
    Background,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub compute_threads: usize,
    pub background_threads: usize,
    pub progress_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            compute_threads: available.saturating_sub(1).clamp(1, 8),
            background_threads: available.clamp(1, 2),
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    compute_pool: BlockingPool,
    background_pool: BlockingPool,
    timer_runtime: Option<Runtime>,
    timer_handle: tokio::runtime::Handle,
    progress: ProgressSender,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> std::io::Result<Self> {
        let runtime = build_timer_runtime()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(config, Some(runtime), handle))
    }

    /// Reuses an existing Tokio runtime for timers instead of starting one.
    pub fn new_with_handle(config: SchedulerConfig, handle: tokio::runtime::Handle) -> Self {
        Self::build(config, None, handle)
    }

    fn build(
        config: SchedulerConfig,
        timer_runtime: Option<Runtime>,
        timer_handle: tokio::runtime::Handle,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(config.progress_channel_capacity.max(1));
        Self {
            inner: Arc::new(SchedulerInner {
                compute_pool: build_rayon_pool("pde-compute", config.compute_threads),
                background_pool: build_rayon_pool("pde-background", config.background_threads),
                timer_runtime,
                timer_handle,
                progress: ProgressSender::new(progress_tx),
            }),
        }
    }

    pub fn progress(&self) -> ProgressSender {
        self.inner.progress.clone()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<crate::ProgressEvent> {
        self.inner.progress.subscribe()
    }

    pub fn timer_handle(&self) -> tokio::runtime::Handle {
        self.inner.timer_handle.clone()
    }

    pub fn spawn_blocking_on<T, F>(
        &self,
        pool: PoolKind,
        token: CancellationToken,
        f: F,
    ) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(TaskError::Cancelled));
            return BlockingTask::new(token, rx);
        }

        let token_for_job = token.clone();
        let job = move || {
            let result =
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(token_for_job))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::from(err)),
                    Err(panic) => {
                        tracing::error!(
                            target = "pde.scheduler",
                            pool = ?pool,
                            panic = %panic_message(&*panic),
                            "task panicked"
                        );
                        Err(TaskError::Panicked)
                    }
                };
            let _ = tx.send(result);
        };

        match pool {
            PoolKind::Compute => self.inner.compute_pool.spawn(job),
            PoolKind::Background => self.inner.background_pool.spawn(job),
        }

        BlockingTask::new(token, rx)
    }

    pub fn spawn_background<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_blocking_on(PoolKind::Background, CancellationToken::new(), f)
    }

    pub fn spawn_background_with_token<T, F>(
        &self,
        token: CancellationToken,
        f: F,
    ) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_blocking_on(PoolKind::Background, token, f)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.timer_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
