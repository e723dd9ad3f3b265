//! Coalescing of bursty requests into one background job per key.
//!
//! Each key names a job family. A request starts (or restarts) the family's quiet period and
//! supersedes whatever the family had pending or running: the previous job's token is
//! cancelled. Only the last request of a burst runs.

use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{CancellationToken, Cancelled, PoolKind, Scheduler, TaskError};

/// How one debounced request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// The job ran to completion.
    Ran,
    /// A later request of the same family replaced it.
    Superseded,
    /// Cancelled through its handle or [`KeyedDebouncer::cancel`].
    Cancelled,
    /// The job panicked.
    Failed,
}

struct Family {
    generation: u64,
    /// Requests since the family's job last started.
    requests: u32,
    token: CancellationToken,
}

struct Families<K> {
    scheduler: Scheduler,
    pool: PoolKind,
    quiet_period: Duration,
    by_key: Mutex<HashMap<K, Family>>,
}

impl<K: Eq + Hash> Families<K> {
    fn superseded(&self, key: &K, generation: u64) -> bool {
        self.by_key
            .lock()
            .get(key)
            .is_some_and(|family| family.generation != generation)
    }

    /// Marks the burst as consumed. `None` when a newer request took over.
    fn start(&self, key: &K, generation: u64) -> Option<u32> {
        let mut by_key = self.by_key.lock();
        let family = by_key.get_mut(key).filter(|f| f.generation == generation)?;
        Some(std::mem::take(&mut family.requests))
    }

    fn finish(&self, key: &K, generation: u64) {
        let mut by_key = self.by_key.lock();
        if by_key.get(key).is_some_and(|f| f.generation == generation) {
            by_key.remove(key);
        }
    }
}

#[derive(Clone)]
pub struct KeyedDebouncer<K> {
    families: Arc<Families<K>>,
}

pub struct KeyedDebouncedHandle {
    token: CancellationToken,
    outcome: oneshot::Receiver<DebounceOutcome>,
}

impl KeyedDebouncedHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Blocks until the request settles. Must not be called on a runtime thread.
    pub fn wait_blocking(self) -> DebounceOutcome {
        self.outcome
            .blocking_recv()
            .unwrap_or(DebounceOutcome::Superseded)
    }
}

impl<K> KeyedDebouncer<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    pub fn new(scheduler: Scheduler, pool: PoolKind, quiet_period: Duration) -> Self {
        Self {
            families: Arc::new(Families {
                scheduler,
                pool,
                quiet_period,
                by_key: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.families.quiet_period
    }

    pub fn debounce<F>(&self, key: K, job: F) -> KeyedDebouncedHandle
    where
        F: FnOnce(CancellationToken) -> Result<(), Cancelled> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut by_key = self.families.by_key.lock();
            let family = by_key.entry(key.clone()).or_insert_with(|| Family {
                generation: 0,
                requests: 0,
                token: CancellationToken::new(),
            });
            family.token.cancel();
            family.token = token.clone();
            family.generation += 1;
            family.requests += 1;
            family.generation
        };

        let (tx, outcome) = oneshot::channel();
        let families = Arc::clone(&self.families);
        let job_token = token.clone();
        self.families.scheduler.timer_handle().spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = job_token.cancelled() => None,
                _ = tokio::time::sleep(families.quiet_period) => Some(()),
            };
            let outcome = match outcome.and_then(|()| families.start(&key, generation)) {
                None if families.superseded(&key, generation) => DebounceOutcome::Superseded,
                None => DebounceOutcome::Cancelled,
                Some(coalesced) => {
                    tracing::debug!(
                        target = "pde.scheduler",
                        key = ?key,
                        coalesced,
                        "running debounced job"
                    );
                    let task = families
                        .scheduler
                        .spawn_blocking_on(families.pool, job_token.clone(), job);
                    match task.join().await {
                        Ok(()) => DebounceOutcome::Ran,
                        Err(TaskError::Cancelled) if families.superseded(&key, generation) => {
                            DebounceOutcome::Superseded
                        }
                        Err(TaskError::Cancelled) => DebounceOutcome::Cancelled,
                        Err(TaskError::Panicked) => DebounceOutcome::Failed,
                    }
                }
            };
            families.finish(&key, generation);
            let _ = tx.send(outcome);
        });

        KeyedDebouncedHandle { token, outcome }
    }

    /// Whether `key` has a job waiting out its quiet period or running.
    pub fn is_pending(&self, key: &K) -> bool {
        self.families.by_key.lock().contains_key(key)
    }

    pub fn cancel(&self, key: &K) -> bool {
        let Some(family) = self.families.by_key.lock().remove(key) else {
            return false;
        };
        family.token.cancel();
        true
    }
}
