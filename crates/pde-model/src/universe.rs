//! The pool of known plug-ins: workspace and external partitions with id indexes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use pde_core::MatchRule;

use crate::event::{EventHub, ModelChangeEvent, ModelListener, SubscriptionId};
use crate::plugin::{DescriptorHandle, PluginDescriptor};

#[derive(Debug, Default)]
struct Partition {
    /// Declaration order.
    models: Vec<Arc<PluginDescriptor>>,
    /// Symbolic id -> positions in `models`, ascending.
    by_id: HashMap<String, Vec<usize>>,
}

impl Partition {
    fn reindex(&mut self) {
        self.by_id.clear();
        for (idx, model) in self.models.iter().enumerate() {
            self.by_id.entry(model.id.clone()).or_default().push(idx);
        }
    }

    fn with_id<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Arc<PluginDescriptor>> + 'a {
        self.by_id
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.models[idx])
    }

    fn position_of(&self, handle: DescriptorHandle) -> Option<usize> {
        self.models.iter().position(|m| m.handle == handle)
    }
}

#[derive(Debug, Default)]
struct UniverseState {
    workspace: Partition,
    external: Partition,
}

/// Known plug-in and fragment descriptors.
///
/// Lookups search the workspace partition first, so a workspace descriptor shadows an
/// external one with the same id and version. Within a partition the first match in
/// declaration order wins.
///
/// Index structures sit behind a lock; every mutation publishes a [`ModelChangeEvent`] after
/// the lock is released.
#[derive(Default)]
pub struct BundleUniverse {
    state: RwLock<UniverseState>,
    next_handle: AtomicU64,
    events: EventHub,
}

/// Defers event delivery until dropped; nested guards flush once, at the outermost drop.
pub struct BatchGuard<'a> {
    universe: &'a BundleUniverse,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.universe.events.end_batch();
    }
}

impl BundleUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ModelListener>) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Buffers change events until the returned guard is dropped, then delivers one merged batch.
    pub fn batch(&self) -> BatchGuard<'_> {
        self.events.begin_batch();
        BatchGuard { universe: self }
    }

    fn assign_handle(&self, descriptor: &mut PluginDescriptor) {
        descriptor.handle = DescriptorHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
    }

    /// Adds a workspace descriptor, or reloads it in place if its project is already known.
    pub fn put_workspace(&self, mut descriptor: PluginDescriptor) -> Arc<PluginDescriptor> {
        let event;
        let stored;
        {
            let mut state = self.state.write();
            let existing = descriptor.project().and_then(|project| {
                state
                    .workspace
                    .models
                    .iter()
                    .position(|m| m.project() == Some(project))
            });
            match existing {
                Some(idx) => {
                    descriptor.handle = state.workspace.models[idx].handle;
                    stored = Arc::new(descriptor);
                    state.workspace.models[idx] = Arc::clone(&stored);
                    event = ModelChangeEvent::changed(vec![Arc::clone(&stored)]);
                }
                None => {
                    self.assign_handle(&mut descriptor);
                    stored = Arc::new(descriptor);
                    state.workspace.models.push(Arc::clone(&stored));
                    event = ModelChangeEvent::added(vec![Arc::clone(&stored)]);
                }
            }
            state.workspace.reindex();
        }
        tracing::debug!(
            target = "pde.model",
            id = %stored.id,
            loaded = stored.loaded,
            "workspace descriptor updated"
        );
        self.events.publish(event);
        stored
    }

    pub fn remove_workspace(&self, project: &str) -> Option<Arc<PluginDescriptor>> {
        let removed = {
            let mut state = self.state.write();
            let idx = state
                .workspace
                .models
                .iter()
                .position(|m| m.project() == Some(project))?;
            let removed = state.workspace.models.remove(idx);
            state.workspace.reindex();
            removed
        };
        self.events
            .publish(ModelChangeEvent::removed(vec![Arc::clone(&removed)]));
        Some(removed)
    }

    /// Replaces the whole external partition (target reload).
    pub fn replace_external(&self, descriptors: Vec<PluginDescriptor>) -> Vec<Arc<PluginDescriptor>> {
        let mut added = Vec::with_capacity(descriptors.len());
        for mut descriptor in descriptors {
            self.assign_handle(&mut descriptor);
            added.push(Arc::new(descriptor));
        }
        let removed = {
            let mut state = self.state.write();
            let removed = std::mem::replace(&mut state.external.models, added.clone());
            state.external.reindex();
            removed
        };
        self.events.publish(ModelChangeEvent {
            added: added.clone(),
            removed,
            changed: Vec::new(),
        });
        added
    }

    /// Sets the enabled flag of each external descriptor to `enabled(descriptor)`.
    ///
    /// Returns the descriptors whose flag flipped; they are also published as one change batch.
    pub fn update_external_enabled(
        &self,
        mut enabled: impl FnMut(&PluginDescriptor) -> bool,
    ) -> Vec<Arc<PluginDescriptor>> {
        let changed: Vec<Arc<PluginDescriptor>> = {
            let mut state = self.state.write();
            let mut changed = Vec::new();
            for slot in state.external.models.iter_mut() {
                let want = enabled(&**slot);
                if slot.enabled != want {
                    let mut updated = PluginDescriptor::clone(&**slot);
                    updated.enabled = want;
                    *slot = Arc::new(updated);
                    changed.push(Arc::clone(slot));
                }
            }
            changed
        };
        if !changed.is_empty() {
            self.events
                .publish(ModelChangeEvent::changed(changed.clone()));
        }
        changed
    }

    /// First resolvable non-fragment matching `(id, version, rule)`; workspace before external.
    pub fn find_plugin(
        &self,
        id: &str,
        version: Option<&str>,
        rule: MatchRule,
    ) -> Option<Arc<PluginDescriptor>> {
        self.find(id, version, rule, false)
    }

    /// Like [`find_plugin`](Self::find_plugin) but fragments qualify too.
    pub fn find_bundle(
        &self,
        id: &str,
        version: Option<&str>,
        rule: MatchRule,
    ) -> Option<Arc<PluginDescriptor>> {
        self.find(id, version, rule, true)
    }

    fn find(
        &self,
        id: &str,
        version: Option<&str>,
        rule: MatchRule,
        include_fragments: bool,
    ) -> Option<Arc<PluginDescriptor>> {
        let state = self.state.read();
        let found = [&state.workspace, &state.external]
            .into_iter()
            .flat_map(|partition| partition.with_id(id))
            .find(|m| {
                m.is_resolvable()
                    && (include_fragments || !m.is_fragment())
                    && m.matches(id, version, rule)
            })
            .cloned();
        found
    }

    /// Fragments whose host reference accepts `(host_id, host_version)` under the fragment's
    /// own match rule. Workspace fragments come first; an external fragment with the same id and
    /// version as a workspace one is shadowed.
    pub fn find_fragments_for(
        &self,
        host_id: &str,
        host_version: Option<&str>,
    ) -> Vec<Arc<PluginDescriptor>> {
        let state = self.state.read();
        let mut out: Vec<Arc<PluginDescriptor>> = Vec::new();
        for partition in [&state.workspace, &state.external] {
            for model in &partition.models {
                let Some(host) = model.host() else { continue };
                if !model.is_resolvable() || !host.accepts(host_id, host_version) {
                    continue;
                }
                let shadowed = out
                    .iter()
                    .any(|m| m.id == model.id && m.version == model.version);
                if !shadowed {
                    out.push(Arc::clone(model));
                }
            }
        }
        out
    }

    pub fn find_by_project(&self, project: &str) -> Option<Arc<PluginDescriptor>> {
        let state = self.state.read();
        state
            .workspace
            .models
            .iter()
            .find(|m| m.project() == Some(project))
            .cloned()
    }

    pub fn find_by_handle(&self, handle: DescriptorHandle) -> Option<Arc<PluginDescriptor>> {
        let state = self.state.read();
        for partition in [&state.workspace, &state.external] {
            if let Some(idx) = partition.position_of(handle) {
                return Some(Arc::clone(&partition.models[idx]));
            }
        }
        None
    }

    pub fn workspace_models(&self) -> Vec<Arc<PluginDescriptor>> {
        self.state.read().workspace.models.clone()
    }

    pub fn external_models(&self) -> Vec<Arc<PluginDescriptor>> {
        self.state.read().external.models.clone()
    }

    /// All resolvable descriptors, external ones shadowed by a workspace descriptor with the
    /// same id removed.
    pub fn active_models(&self) -> Vec<Arc<PluginDescriptor>> {
        let state = self.state.read();
        let mut out: Vec<Arc<PluginDescriptor>> = state
            .workspace
            .models
            .iter()
            .filter(|m| m.is_resolvable())
            .cloned()
            .collect();
        for model in &state.external.models {
            if model.is_resolvable() && !state.workspace.by_id.contains_key(&model.id) {
                out.push(Arc::clone(model));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        let state = self.state.read();
        state.workspace.models.len() + state.external.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
