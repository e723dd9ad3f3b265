//! Typed model-change batches and their re-entrancy-safe delivery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::plugin::{DescriptorHandle, PluginDescriptor};

/// One batch of descriptor changes.
#[derive(Debug, Clone, Default)]
pub struct ModelChangeEvent {
    pub added: Vec<Arc<PluginDescriptor>>,
    pub removed: Vec<Arc<PluginDescriptor>>,
    pub changed: Vec<Arc<PluginDescriptor>>,
}

impl ModelChangeEvent {
    pub fn added(models: Vec<Arc<PluginDescriptor>>) -> Self {
        Self {
            added: models,
            ..Self::default()
        }
    }

    pub fn removed(models: Vec<Arc<PluginDescriptor>>) -> Self {
        Self {
            removed: models,
            ..Self::default()
        }
    }

    pub fn changed(models: Vec<Arc<PluginDescriptor>>) -> Self {
        Self {
            changed: models,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Folds a later event into this one so the result describes both, net.
    ///
    /// Something added and then removed inside one batch never shows up. A change to
    /// something added in the same batch is still reported as an add.
    pub fn merge(&mut self, later: ModelChangeEvent) {
        for model in later.added {
            let handle = model.handle;
            if let Some(pos) = position(&self.removed, handle) {
                self.removed.remove(pos);
                replace_or_push(&mut self.changed, model);
            } else {
                replace_or_push(&mut self.added, model);
            }
        }
        for model in later.removed {
            let handle = model.handle;
            if let Some(pos) = position(&self.added, handle) {
                self.added.remove(pos);
                continue;
            }
            if let Some(pos) = position(&self.changed, handle) {
                self.changed.remove(pos);
            }
            replace_or_push(&mut self.removed, model);
        }
        for model in later.changed {
            let handle = model.handle;
            if let Some(pos) = position(&self.added, handle) {
                self.added[pos] = model;
            } else {
                replace_or_push(&mut self.changed, model);
            }
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<PluginDescriptor>> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.changed.iter())
    }

    /// Workspace projects touched by this batch, deduplicated, in event order.
    pub fn affected_projects(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for project in self.all().filter_map(|m| m.project()) {
            if !out.iter().any(|p| p == project) {
                out.push(project.to_string());
            }
        }
        out
    }
}

fn position(models: &[Arc<PluginDescriptor>], handle: DescriptorHandle) -> Option<usize> {
    models.iter().position(|m| m.handle == handle)
}

fn replace_or_push(models: &mut Vec<Arc<PluginDescriptor>>, model: Arc<PluginDescriptor>) {
    match position(models, model.handle) {
        Some(pos) => models[pos] = model,
        None => models.push(model),
    }
}

/// Receives model change batches.
///
/// Listeners may query or mutate the universe from inside the callback; events raised while
/// a batch is being delivered are queued and delivered after it.
pub trait ModelListener: Send + Sync {
    fn models_changed(&self, event: &ModelChangeEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Batch {
    depth: usize,
    pending: ModelChangeEvent,
}

/// Publish/subscribe hub with a pending queue and nested batching.
#[derive(Default)]
pub(crate) struct EventHub {
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn ModelListener>)>>,
    queue: Mutex<VecDeque<ModelChangeEvent>>,
    dispatching: AtomicBool,
    batch: Mutex<Batch>,
    next_id: AtomicU64,
}

impl EventHub {
    pub(crate) fn subscribe(&self, listener: Arc<dyn ModelListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn begin_batch(&self) {
        self.batch.lock().depth += 1;
    }

    pub(crate) fn end_batch(&self) {
        let flushed = {
            let mut batch = self.batch.lock();
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth > 0 {
                return;
            }
            std::mem::take(&mut batch.pending)
        };
        if !flushed.is_empty() {
            self.enqueue(flushed);
        }
    }

    pub(crate) fn publish(&self, event: ModelChangeEvent) {
        if event.is_empty() {
            return;
        }
        {
            let mut batch = self.batch.lock();
            if batch.depth > 0 {
                batch.pending.merge(event);
                return;
            }
        }
        self.enqueue(event);
    }

    fn enqueue(&self, event: ModelChangeEvent) {
        self.queue.lock().push_back(event);
        self.drain();
    }

    fn drain(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                // Whoever is dispatching will pick the queued event up.
                return;
            }

            loop {
                let next = self.queue.lock().pop_front();
                let Some(event) = next else { break };
                let listeners: Vec<Arc<dyn ModelListener>> = self
                    .listeners
                    .lock()
                    .iter()
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                for listener in listeners {
                    listener.models_changed(&event);
                }
            }

            self.dispatching.store(false, Ordering::Release);
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}
