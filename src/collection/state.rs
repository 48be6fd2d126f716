//! Ordered, id- and cid-indexed model storage.

use crate::model::Model;
use crate::types::{Cid, Comparator, ModelId, ModelKey, WatchId};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A model taken out of the store, with the slot it occupied.
pub(crate) struct Evicted<M> {
    pub index: usize,
    pub model: M,
    pub watch: Option<WatchId>,
}

/// Storage behind a collection. Not synchronized; callers hold the lock.
pub(crate) struct CollectionState<M: Model> {
    /// Members in collection order.
    models: Vec<M>,

    /// Members that have an id.
    by_id: HashMap<ModelId, M>,

    /// Every member, by client id.
    by_cid: HashMap<Cid, M>,

    /// Change watchers this collection registered on its members.
    watches: HashMap<Cid, WatchId>,
}

impl<M: Model> CollectionState<M> {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            by_id: HashMap::new(),
            by_cid: HashMap::new(),
            watches: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[M] {
        &self.models
    }

    pub fn get(&self, key: &ModelKey) -> Option<&M> {
        match key {
            ModelKey::Id(id) => self.by_id.get(id),
            ModelKey::Cid(cid) => self.by_cid.get(cid),
        }
    }

    pub fn get_by_id(&self, id: &ModelId) -> Option<&M> {
        self.by_id.get(id)
    }

    pub fn get_by_cid(&self, cid: Cid) -> Option<&M> {
        self.by_cid.get(&cid)
    }

    /// The stored member matching `model`, by id first and then by cid.
    pub fn find(&self, model: &M) -> Option<&M> {
        model
            .id()
            .and_then(|id| self.by_id.get(&id))
            .or_else(|| self.by_cid.get(&model.cid()))
    }

    pub fn contains(&self, model: &M) -> bool {
        self.find(model).is_some()
    }

    pub fn index_of(&self, model: &M) -> Option<usize> {
        let cid = self.find(model)?.cid();
        self.models.iter().position(|m| m.cid() == cid)
    }

    /// Insert a model unless an equivalent one is already stored.
    ///
    /// With a comparator the model goes after every member that does not
    /// sort after it; without one it is appended. Returns the index used.
    pub fn insert(&mut self, model: M, comparator: Option<&Comparator<M>>) -> Option<usize> {
        if self.contains(&model) {
            return None;
        }

        let index = match comparator {
            Some(cmp) => self
                .models
                .partition_point(|member| cmp(member, &model) != Ordering::Greater),
            None => self.models.len(),
        };

        if let Some(id) = model.id() {
            self.by_id.insert(id, model.clone());
        }
        self.by_cid.insert(model.cid(), model.clone());
        self.models.insert(index, model);
        Some(index)
    }

    /// Remove the member matching `model`.
    pub fn remove(&mut self, model: &M) -> Option<Evicted<M>> {
        let cid = self.find(model)?.cid();
        let index = self.models.iter().position(|m| m.cid() == cid)?;
        let stored = self.models.remove(index);

        if let Some(id) = stored.id() {
            self.by_id.remove(&id);
        }
        self.by_cid.remove(&cid);
        let watch = self.watches.remove(&cid);

        Some(Evicted {
            index,
            model: stored,
            watch,
        })
    }

    /// Empty the store, handing back every member with its watcher.
    pub fn clear(&mut self) -> Vec<(M, Option<WatchId>)> {
        self.by_id.clear();
        self.by_cid.clear();
        let mut watches = std::mem::take(&mut self.watches);
        std::mem::take(&mut self.models)
            .into_iter()
            .map(|model| {
                let watch = watches.remove(&model.cid());
                (model, watch)
            })
            .collect()
    }

    /// Record the watcher registered on a member. Returns false if the
    /// model is no longer stored.
    pub fn set_watch(&mut self, cid: Cid, watch: WatchId) -> bool {
        if !self.by_cid.contains_key(&cid) {
            return false;
        }
        self.watches.insert(cid, watch);
        true
    }

    pub fn sort(&mut self, comparator: &Comparator<M>) {
        self.models.sort_by(|a, b| comparator(a, b));
    }
}
