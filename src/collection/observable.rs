//! Observable collection: the base primitive parents and subsets are built on.

use crate::error::{CollectionError, Result};
use crate::events::{CollectionEvent, ListenerRegistry, SubscriptionHandle};
use crate::model::{Model, ModelChange, Watcher};
use crate::types::{Cid, CollectionId, Comparator, ListenerId, ModelId, ModelKey, MutationOptions};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::state::CollectionState;

/// An ordered, indexed set of models that announces every mutation.
///
/// Cloning yields another handle to the same collection. Listeners run
/// synchronously on the mutating thread, after the mutation is applied, with
/// no collection lock held.
///
/// Comparators run while the collection is locked and must not call back
/// into it.
pub struct ObservableCollection<M: Model> {
    inner: Arc<CollectionInner<M>>,
}

struct CollectionInner<M: Model> {
    id: CollectionId,
    state: RwLock<CollectionState<M>>,
    comparator: RwLock<Option<Comparator<M>>>,
    listeners: ListenerRegistry<M>,
}

impl<M: Model> Clone for ObservableCollection<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Model> ObservableCollection<M> {
    /// Create an empty, unordered collection.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an empty collection kept sorted by `comparator`.
    pub fn with_comparator(comparator: Comparator<M>) -> Self {
        Self::build(Some(comparator))
    }

    /// Create a collection seeded with `models`, without emitting events.
    pub fn from_models(models: Vec<M>) -> Result<Self> {
        let collection = Self::new();
        collection.reset(models, MutationOptions::silent())?;
        Ok(collection)
    }

    fn build(comparator: Option<Comparator<M>>) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                id: CollectionId::next(),
                state: RwLock::new(CollectionState::new()),
                comparator: RwLock::new(comparator),
                listeners: ListenerRegistry::new(),
            }),
        }
    }

    pub fn id(&self) -> CollectionId {
        self.inner.id
    }

    pub fn comparator(&self) -> Option<Comparator<M>> {
        self.inner.comparator.read().clone()
    }

    /// Replace the comparator. Existing members keep their order until
    /// [`sort`](Self::sort) is called.
    pub fn set_comparator(&self, comparator: Option<Comparator<M>>) {
        *self.inner.comparator.write() = comparator;
    }

    // --- Queries ---

    pub fn len(&self) -> usize {
        self.inner.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &ModelKey) -> Option<M> {
        self.inner.state.read().get(key).cloned()
    }

    pub fn get_by_id(&self, id: &ModelId) -> Option<M> {
        self.inner.state.read().get_by_id(id).cloned()
    }

    pub fn get_by_cid(&self, cid: Cid) -> Option<M> {
        self.inner.state.read().get_by_cid(cid).cloned()
    }

    /// Whether a model with the same id (or, for unsaved models, the same
    /// cid) is a member.
    pub fn contains(&self, model: &M) -> bool {
        self.inner.state.read().contains(model)
    }

    pub fn contains_key(&self, key: &ModelKey) -> bool {
        self.inner.state.read().get(key).is_some()
    }

    pub fn index_of(&self, model: &M) -> Option<usize> {
        self.inner.state.read().index_of(model)
    }

    pub fn at(&self, index: usize) -> Option<M> {
        self.inner.state.read().models().get(index).cloned()
    }

    /// Snapshot of the members in collection order.
    pub fn models(&self) -> Vec<M> {
        self.inner.state.read().models().to_vec()
    }

    /// Membership keys in collection order.
    pub fn keys(&self) -> Vec<ModelKey> {
        self.inner
            .state
            .read()
            .models()
            .iter()
            .map(Model::key)
            .collect()
    }

    /// Visit every member in order. Runs over a snapshot, so `f` may mutate
    /// the collection.
    pub fn each<F: FnMut(&M)>(&self, mut f: F) {
        for model in self.models() {
            f(&model);
        }
    }

    /// The value of `attribute` on every member, in order.
    pub fn pluck(&self, attribute: &str) -> Vec<Option<Value>> {
        self.inner
            .state
            .read()
            .models()
            .iter()
            .map(|m| m.attribute(attribute))
            .collect()
    }

    // --- Mutations ---

    /// Validate and insert a model. Returns false if an equivalent model is
    /// already a member, in which case nothing is emitted.
    pub fn add(&self, model: M, options: MutationOptions) -> Result<bool> {
        validate(&model)?;
        Ok(self.insert(model, options))
    }

    /// Validate every model, then insert them in order. Returns how many
    /// were new.
    pub fn add_many(&self, models: Vec<M>, options: MutationOptions) -> Result<usize> {
        for model in &models {
            validate(model)?;
        }
        Ok(models
            .into_iter()
            .filter(|model| self.insert(model.clone(), options))
            .count())
    }

    /// Remove the member matching `model`, returning the stored instance.
    pub fn remove(&self, model: &M, options: MutationOptions) -> Option<M> {
        let evicted = self.inner.state.write().remove(model)?;

        if let Some(watch) = evicted.watch {
            evicted.model.unwatch(watch);
        }

        trace!(
            collection = self.inner.id.0,
            key = %evicted.model.key(),
            index = evicted.index,
            "model removed"
        );

        if !options.silent {
            self.inner.listeners.emit(&CollectionEvent::Removed {
                model: evicted.model.clone(),
                index: evicted.index,
                origin: options.origin,
            });
        }
        Some(evicted.model)
    }

    /// Remove the member stored under `key`.
    pub fn remove_key(&self, key: &ModelKey, options: MutationOptions) -> Option<M> {
        let model = self.get(key)?;
        self.remove(&model, options)
    }

    /// Replace every member with `models`. Duplicates are dropped, the first
    /// occurrence winning. Nothing changes if any model fails validation.
    pub fn reset(&self, models: Vec<M>, options: MutationOptions) -> Result<()> {
        for model in &models {
            validate(model)?;
        }
        self.replace(models, options);
        Ok(())
    }

    /// Re-sort members with the comparator. No-op without one.
    pub fn sort(&self, options: MutationOptions) {
        let Some(comparator) = self.comparator() else {
            return;
        };
        self.inner.state.write().sort(&comparator);

        if !options.silent {
            self.inner.listeners.emit(&CollectionEvent::Sorted {
                origin: options.origin,
            });
        }
    }

    // --- Events ---

    /// Register a listener for every event of this collection.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<M>) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(listener))
    }

    /// Register a bounded channel subscriber.
    pub fn subscribe_channel(&self, buffer_size: usize) -> SubscriptionHandle<M> {
        self.inner.listeners.subscribe_channel(buffer_size)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.listener_count()
    }

    /// Deliver `event` to every listener as if this collection emitted it.
    pub fn trigger(&self, event: CollectionEvent<M>) {
        self.inner.listeners.emit(&event);
    }

    // --- Internal ---

    /// Insert without validation. Used for models already accepted by
    /// another collection.
    pub(crate) fn insert(&self, model: M, options: MutationOptions) -> bool {
        let comparator = self.comparator();
        let inserted = self
            .inner
            .state
            .write()
            .insert(model.clone(), comparator.as_ref());

        let Some(index) = inserted else {
            trace!(collection = self.inner.id.0, key = %model.key(), "duplicate add ignored");
            return false;
        };

        self.watch(&model);
        trace!(collection = self.inner.id.0, key = %model.key(), index, "model added");

        if !options.silent {
            self.inner.listeners.emit(&CollectionEvent::Added {
                model,
                index,
                origin: options.origin,
            });
        }
        true
    }

    /// Replace members without validation.
    pub(crate) fn replace(&self, models: Vec<M>, options: MutationOptions) {
        let comparator = self.comparator();

        let (previous, current) = {
            let mut state = self.inner.state.write();
            let previous = state.clear();
            let mut current = Vec::with_capacity(models.len());
            for model in models {
                if state.insert(model.clone(), None).is_some() {
                    current.push(model);
                }
            }
            if let Some(comparator) = &comparator {
                state.sort(comparator);
            }
            (previous, current)
        };

        for (model, watch) in previous {
            if let Some(watch) = watch {
                model.unwatch(watch);
            }
        }
        for model in &current {
            self.watch(model);
        }

        debug!(
            collection = self.inner.id.0,
            count = current.len(),
            proxied = options.proxied,
            "collection reset"
        );

        if !options.silent {
            self.inner.listeners.emit(&CollectionEvent::Reset {
                origin: options.origin,
                model_ids: None,
                proxied: options.proxied,
                silent: false,
            });
        }
    }

    fn watch(&self, model: &M) {
        let weak: Weak<CollectionInner<M>> = Arc::downgrade(&self.inner);
        let watcher: Watcher = Arc::new(move |change: &ModelChange| {
            if let Some(inner) = weak.upgrade() {
                ObservableCollection { inner }.forward_change(change);
            }
        });

        if let Some(watch) = model.watch(watcher) {
            let recorded = self.inner.state.write().set_watch(model.cid(), watch);
            if !recorded {
                model.unwatch(watch);
            }
        }
    }

    /// Re-announce a member's attribute change as collection events.
    fn forward_change(&self, change: &ModelChange) {
        let Some(model) = self.get_by_cid(change.cid) else {
            return;
        };

        for attribute in &change.attributes {
            self.inner.listeners.emit(&CollectionEvent::Changed {
                model: model.clone(),
                attribute: Some(attribute.clone()),
            });
        }
        self.inner.listeners.emit(&CollectionEvent::Changed {
            model,
            attribute: None,
        });
    }
}

impl<M: Model> Default for ObservableCollection<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> fmt::Debug for ObservableCollection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .finish()
    }
}

impl<M: Model> Drop for CollectionInner<M> {
    fn drop(&mut self) {
        for (model, watch) in self.state.get_mut().clear() {
            if let Some(watch) = watch {
                model.unwatch(watch);
            }
        }
    }
}

fn validate<M: Model>(model: &M) -> Result<()> {
    model.validate().map_err(|reason| CollectionError::InvalidModel {
        key: model.key(),
        reason,
    })
}
