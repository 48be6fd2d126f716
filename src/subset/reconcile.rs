//! Resynchronization and write-through reset.

use crate::error::Result;
use crate::events::CollectionEvent;
use crate::model::Model;
use crate::types::{Cid, ModelKey, MutationOptions, Origin};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::SubsetCollection;

impl<M: Model> SubsetCollection<M> {
    /// Rebuild membership from the parent's current contents.
    ///
    /// Emits a `Reset` on the subset unless `options.silent`; `origin` and
    /// `proxied` are carried onto that event.
    pub fn resync(&self, options: MutationOptions) {
        let members: Vec<M> = self
            .inner
            .parent
            .models()
            .into_iter()
            .filter(|model| self.accepts(model))
            .collect();

        debug!(
            subset = self.id().0,
            members = members.len(),
            proxied = options.proxied,
            "resynchronizing subset"
        );
        self.inner.store.replace(members, options);
    }

    /// Replace this subset's contents with `models`, writing through to the
    /// parent.
    ///
    /// The parent loses the models this subset held, along with any model
    /// stored under a key that `models` reuses, and gains `models`; models
    /// held by other subsets under other keys are left alone. The parent then
    /// announces one `Reset` originating from this subset, listing the keys
    /// whose membership changed plus the keys now backed by a different
    /// instance, so sibling subsets only resync when those keys concern them.
    /// With `options.silent` every resync it causes is silent.
    pub fn reset(&self, models: Vec<M>, options: MutationOptions) -> Result<()> {
        self.ensure_bound()?;
        let parent = &self.inner.parent;

        let ids = self.keys();
        let new_ids: Vec<ModelKey> = models.iter().map(Model::key).collect();

        let replaced: HashSet<&ModelKey> = ids.iter().chain(new_ids.iter()).collect();
        let current = parent.models();
        let mut snapshot: Vec<M> = current
            .iter()
            .filter(|model| !replaced.contains(&model.key()))
            .cloned()
            .collect();

        let mut model_ids = xor(&ids, &new_ids);
        model_ids.extend(swapped(&current, &models, &ids));
        snapshot.extend(models);

        let origin = Origin::Collection(self.id());
        parent.reset(snapshot, MutationOptions::silent().with_origin(origin))?;

        debug!(
            subset = self.id().0,
            parent = parent.id().0,
            changed = model_ids.len(),
            "subset reset written through"
        );

        parent.trigger(CollectionEvent::Reset {
            origin,
            model_ids: Some(model_ids),
            proxied: false,
            silent: options.silent,
        });
        Ok(())
    }

    /// Re-evaluate one model's membership against the sieve. Returns whether
    /// membership changed.
    pub fn refresh(&self, model: &M) -> bool {
        self.reconcile_key(&model.key(), Origin::Direct)
    }

    /// Bring the member stored under `key` in line with the parent's current
    /// instance: held only if the parent holds it and the sieve accepts it.
    pub(super) fn reconcile_key(&self, key: &ModelKey, origin: Origin) -> bool {
        let held = self.inner.store.get(key);
        let wanted = self
            .inner
            .parent
            .get(key)
            .filter(|current| self.accepts(current));

        match (held, wanted) {
            (None, Some(current)) => self.add_to_subset(&current, origin),
            (Some(stale), None) => self.remove_from_subset(&stale, origin),
            (Some(stale), Some(current)) if stale.cid() != current.cid() => {
                self.remove_from_subset(&stale, origin);
                self.add_to_subset(&current, origin)
            }
            _ => false,
        }
    }
}

/// Keys this subset held that `models` re-supplies with a different
/// instance than the parent currently stores.
fn swapped<M: Model>(current: &[M], models: &[M], held: &[ModelKey]) -> Vec<ModelKey> {
    let held: HashSet<&ModelKey> = held.iter().collect();
    let stored: HashMap<ModelKey, Cid> = current.iter().map(|m| (m.key(), m.cid())).collect();
    let mut seen = HashSet::new();

    models
        .iter()
        .filter_map(|model| {
            let key = model.key();
            if !seen.insert(key.clone()) || !held.contains(&key) {
                return None;
            }
            match stored.get(&key) {
                Some(cid) if *cid != model.cid() => Some(key),
                _ => None,
            }
        })
        .collect()
}

/// Keys present in exactly one of `a` and `b`: those only in `a` in their
/// order, then those only in `b`.
pub fn xor(a: &[ModelKey], b: &[ModelKey]) -> Vec<ModelKey> {
    let in_a: HashSet<&ModelKey> = a.iter().collect();
    let in_b: HashSet<&ModelKey> = b.iter().collect();
    let mut seen = HashSet::new();

    a.iter()
        .filter(|key| !in_b.contains(key))
        .chain(b.iter().filter(|key| !in_a.contains(key)))
        .filter(|key| seen.insert(*key))
        .cloned()
        .collect()
}
