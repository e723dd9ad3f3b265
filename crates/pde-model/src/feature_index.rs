//! Feature lookup by Idver and by id, with workspace-over-external precedence.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use pde_core::{IdVersion, Version};

use crate::feature::{FeatureDescriptor, FeatureOrigin};

/// One batch of feature changes. Identity is the feature's origin.
#[derive(Debug, Clone, Default)]
pub struct FeatureChangeEvent {
    pub added: Vec<FeatureDescriptor>,
    pub removed: Vec<FeatureOrigin>,
    pub changed: Vec<FeatureDescriptor>,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Every known feature, insertion order.
    entries: Vec<Arc<FeatureDescriptor>>,
    active: HashMap<IdVersion, Arc<FeatureDescriptor>>,
    inactive: HashMap<IdVersion, Vec<Arc<FeatureDescriptor>>>,
}

impl IndexState {
    fn position(&self, origin: &FeatureOrigin) -> Option<usize> {
        self.entries.iter().position(|e| &e.origin == origin)
    }

    fn recompute(&mut self, idver: &IdVersion) {
        let mut candidates: Vec<Arc<FeatureDescriptor>> = self
            .entries
            .iter()
            .filter(|e| &e.idver() == idver)
            .cloned()
            .collect();
        // Stable: workspace models first, each group in insertion order.
        candidates.sort_by_key(|e| !e.is_workspace());

        self.active.remove(idver);
        self.inactive.remove(idver);
        let mut candidates = candidates.into_iter();
        if let Some(winner) = candidates.next() {
            self.active.insert(idver.clone(), winner);
        }
        let losers: Vec<_> = candidates.collect();
        if !losers.is_empty() {
            self.inactive.insert(idver.clone(), losers);
        }
    }
}

/// Feature models indexed by Idver.
///
/// For each Idver at most one model is active. A workspace model wins over external ones; with
/// no workspace model the first external model wins. The rest are parked inactive until the
/// winner goes away.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    state: Mutex<IndexState>,
}

impl FeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a change batch and returns the Idvers whose visibility was recomputed.
    pub fn apply(&self, event: FeatureChangeEvent) -> BTreeSet<IdVersion> {
        let mut state = self.state.lock();
        let mut affected = BTreeSet::new();

        for origin in &event.removed {
            if let Some(idx) = state.position(origin) {
                let removed = state.entries.remove(idx);
                affected.insert(removed.idver());
            }
        }

        for feature in event.added {
            affected.insert(feature.idver());
            match state.position(&feature.origin) {
                Some(idx) => {
                    affected.insert(state.entries[idx].idver());
                    state.entries[idx] = Arc::new(feature);
                }
                None => state.entries.push(Arc::new(feature)),
            }
        }

        for feature in event.changed {
            let new_idver = feature.idver();
            match state.position(&feature.origin) {
                Some(idx) => {
                    let old_idver = state.entries[idx].idver();
                    if old_idver != new_idver {
                        // Re-keyed: drop and re-insert so it lands behind existing models.
                        state.entries.remove(idx);
                        state.entries.push(Arc::new(feature));
                        affected.insert(old_idver);
                    } else {
                        state.entries[idx] = Arc::new(feature);
                    }
                }
                None => state.entries.push(Arc::new(feature)),
            }
            affected.insert(new_idver);
        }

        for idver in &affected {
            state.recompute(idver);
        }

        tracing::trace!(
            target = "pde.model",
            affected = affected.len(),
            active = state.active.len(),
            "feature index updated"
        );
        affected
    }

    /// Replaces every external feature.
    pub fn set_external(&self, features: Vec<FeatureDescriptor>) -> BTreeSet<IdVersion> {
        let removed = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .filter(|e| !e.is_workspace())
                .map(|e| e.origin.clone())
                .collect()
        };
        self.apply(FeatureChangeEvent {
            added: features,
            removed,
            changed: Vec::new(),
        })
    }

    /// Adds or updates a workspace feature.
    pub fn put_workspace(&self, feature: FeatureDescriptor) -> BTreeSet<IdVersion> {
        let known = self.state.lock().position(&feature.origin).is_some();
        let event = if known {
            FeatureChangeEvent {
                changed: vec![feature],
                ..FeatureChangeEvent::default()
            }
        } else {
            FeatureChangeEvent {
                added: vec![feature],
                ..FeatureChangeEvent::default()
            }
        };
        self.apply(event)
    }

    pub fn remove_workspace(&self, project: &str) -> BTreeSet<IdVersion> {
        self.apply(FeatureChangeEvent {
            removed: vec![FeatureOrigin::Workspace {
                project: project.to_string(),
            }],
            ..FeatureChangeEvent::default()
        })
    }

    /// Exact Idver lookup. For the `0.0.0` sentinel a miss falls back to any model with the id.
    pub fn find_feature_model(&self, id: &str, version: &str) -> Option<Arc<FeatureDescriptor>> {
        let found = self
            .state
            .lock()
            .active
            .get(&IdVersion::new(id, version))
            .cloned();
        if found.is_none() && version == Version::UNSPECIFIED {
            return self.find_feature_model_by_id(id);
        }
        found
    }

    /// Like [`find_feature_model`](Self::find_feature_model), then retries with the qualifier
    /// replaced by the literal `qualifier` token.
    pub fn find_feature_model_relaxed(
        &self,
        id: &str,
        version: &str,
    ) -> Option<Arc<FeatureDescriptor>> {
        if let Some(found) = self.find_feature_model(id, version) {
            return Some(found);
        }
        let relaxed = IdVersion::new(id, version).with_qualifier_token()?;
        self.state.lock().active.get(&relaxed).cloned()
    }

    /// First active model with `id`, in insertion order.
    pub fn find_feature_model_by_id(&self, id: &str) -> Option<Arc<FeatureDescriptor>> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|e| e.id == id)
            .find_map(|e| {
                state
                    .active
                    .get(&e.idver())
                    .filter(|active| Arc::ptr_eq(active, e))
                    .cloned()
            })
    }

    /// All valid active models with `id`.
    pub fn find_feature_models(&self, id: &str) -> Vec<Arc<FeatureDescriptor>> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|e| e.id == id && e.is_valid())
            .filter(|e| {
                state
                    .active
                    .get(&e.idver())
                    .is_some_and(|active| Arc::ptr_eq(active, e))
            })
            .cloned()
            .collect()
    }

    pub fn active_models(&self) -> Vec<Arc<FeatureDescriptor>> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|e| {
                state
                    .active
                    .get(&e.idver())
                    .is_some_and(|active| Arc::ptr_eq(active, e))
            })
            .cloned()
            .collect()
    }

    pub fn inactive_models(&self, idver: &IdVersion) -> Vec<Arc<FeatureDescriptor>> {
        self.state
            .lock()
            .inactive
            .get(idver)
            .cloned()
            .unwrap_or_default()
    }
}
