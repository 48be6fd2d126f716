//! Mirroring parent events into the subset.

use crate::events::CollectionEvent;
use crate::model::Model;
use crate::types::{ModelKey, MutationOptions, Origin};
use tracing::{debug, trace};

use super::SubsetCollection;

impl<M: Model> SubsetCollection<M> {
    /// Entry point for every event the parent emits.
    pub(super) fn proxy(&self, event: &CollectionEvent<M>) {
        match event {
            CollectionEvent::Added { model, origin, .. } => self.proxy_add(model, *origin),
            CollectionEvent::Removed { model, origin, .. } => self.proxy_remove(model, *origin),
            CollectionEvent::Reset {
                origin,
                model_ids,
                silent,
                ..
            } => self.proxy_reset(*origin, model_ids.as_deref(), *silent),
            CollectionEvent::Changed { model, attribute } => {
                self.proxy_change(model, attribute.as_deref())
            }
            CollectionEvent::Sorted { .. } => {}
        }
    }

    // Both proxies settle the key against the parent's current contents:
    // under re-entrant dispatch an earlier listener may already have undone
    // the mutation an event describes.
    fn proxy_add(&self, model: &M, origin: Origin) {
        if !origin.admits(self.id()) {
            trace!(subset = self.id().0, key = %model.key(), ?origin, "add not proxied");
            return;
        }
        self.reconcile_key(&model.key(), origin);
    }

    // Keyed on membership, not the sieve: a member whose attributes drifted
    // without a live update still has to leave with the parent.
    fn proxy_remove(&self, model: &M, origin: Origin) {
        if !origin.admits(self.id()) {
            trace!(subset = self.id().0, key = %model.key(), ?origin, "remove not proxied");
            return;
        }
        let key = model.key();
        if self.inner.parent.contains_key(&key) {
            trace!(subset = self.id().0, %key, "removed model is back in parent");
            self.reconcile_key(&key, origin);
            return;
        }
        self.remove_from_subset(model, origin);
    }

    fn proxy_change(&self, model: &M, attribute: Option<&str>) {
        if self.inner.live_update.tracks(attribute) {
            self.refresh(model);
        }
    }

    fn proxy_reset(&self, origin: Origin, model_ids: Option<&[ModelKey]>, silent: bool) {
        if origin == Origin::Unproxied {
            return;
        }

        let originator = origin.is(self.id());
        let concerned = match model_ids {
            None => true,
            Some(_) if originator => true,
            Some(ids) => {
                let affected = self.affected_by(ids);
                trace!(
                    subset = self.id().0,
                    announced = ids.len(),
                    affected = affected.len(),
                    "targeted reset"
                );
                !affected.is_empty()
            }
        };

        if !concerned {
            debug!(subset = self.id().0, ?origin, "reset does not concern subset");
            return;
        }

        self.resync(MutationOptions {
            silent,
            origin,
            proxied: true,
        });
    }

    /// The announced keys that concern this subset: current members, and
    /// parent models the sieve accepts.
    pub(super) fn affected_by(&self, ids: &[ModelKey]) -> Vec<ModelKey> {
        ids.iter()
            .filter(|key| {
                self.inner.store.contains_key(key)
                    || self
                        .inner
                        .parent
                        .get(key)
                        .map_or(false, |candidate| self.accepts(&candidate))
            })
            .cloned()
            .collect()
    }

    /// Insert into the membership store. Idempotent.
    pub(super) fn add_to_subset(&self, model: &M, origin: Origin) -> bool {
        self.inner
            .store
            .insert(model.clone(), MutationOptions::default().with_origin(origin))
    }

    pub(super) fn remove_from_subset(&self, model: &M, origin: Origin) -> bool {
        self.inner
            .store
            .remove(model, MutationOptions::default().with_origin(origin))
            .is_some()
    }
}
