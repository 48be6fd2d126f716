//! The subset collection handle: construction, binding and queries.

use crate::collection::ObservableCollection;
use crate::error::{CollectionError, Result};
use crate::events::{CollectionEvent, SubscriptionHandle};
use crate::model::Model;
use crate::types::{
    Cid, CollectionId, Comparator, ListenerId, LiveUpdate, ModelId, ModelKey, MutationOptions,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{Sieve, SubsetBuilder, SubsetOptions};

/// A live, sieve-filtered view of a parent collection.
///
/// Members are exactly the parent's models the sieve accepts. `add`,
/// `remove` and `reset` write through to the parent; the subset's own
/// membership only changes in reaction to the parent's events.
///
/// Cloning yields another handle to the same subset. When the last handle
/// is dropped the subset unsubscribes from its parent.
pub struct SubsetCollection<M: Model> {
    pub(super) inner: Arc<SubsetInner<M>>,
}

pub(super) struct SubsetInner<M: Model> {
    pub(super) parent: ObservableCollection<M>,

    /// Membership store. Its listeners are the subset's listeners.
    pub(super) store: ObservableCollection<M>,

    pub(super) sieve: Box<dyn Sieve<M>>,

    pub(super) live_update: LiveUpdate,

    /// Listener registered on the parent; `None` once detached.
    binding: Mutex<Option<ListenerId>>,
}

impl<M: Model> Clone for SubsetCollection<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Model> SubsetCollection<M> {
    /// Create a subset of `parent` filtered by `sieve`.
    pub fn new(
        parent: &ObservableCollection<M>,
        sieve: impl Sieve<M>,
        options: SubsetOptions<M>,
    ) -> Result<Self> {
        Self::from_parts(parent.clone(), Box::new(sieve), options)
    }

    pub fn builder(parent: &ObservableCollection<M>, sieve: impl Sieve<M>) -> SubsetBuilder<M> {
        SubsetBuilder::new(parent, sieve)
    }

    pub(super) fn from_parts(
        parent: ObservableCollection<M>,
        sieve: Box<dyn Sieve<M>>,
        options: SubsetOptions<M>,
    ) -> Result<Self> {
        let comparator = sieve
            .comparator()
            .or_else(|| options.comparator.clone())
            .or_else(|| parent.comparator());
        let live_update = sieve
            .live_update()
            .or_else(|| options.live_update.clone())
            .unwrap_or_default();

        let store = match comparator {
            Some(comparator) => ObservableCollection::with_comparator(comparator),
            None => ObservableCollection::new(),
        };

        let subset = Self {
            inner: Arc::new(SubsetInner {
                parent,
                store,
                sieve,
                live_update,
                binding: Mutex::new(None),
            }),
        };

        subset.bind();
        subset.inner.sieve.before_initialize(&subset, &options);

        match &options.models {
            Some(models) if !options.no_reset => {
                subset.reset(models.clone(), MutationOptions::silent())?
            }
            _ => subset.resync(MutationOptions::silent()),
        }

        subset.inner.sieve.initialize(&subset, &options);

        debug!(
            subset = subset.id().0,
            parent = subset.inner.parent.id().0,
            members = subset.len(),
            no_reset = options.no_reset,
            "subset created"
        );
        Ok(subset)
    }

    fn bind(&self) {
        let weak = Arc::downgrade(&self.inner);
        let listener = self
            .inner
            .parent
            .subscribe(move |event: &CollectionEvent<M>| {
                if let Some(inner) = weak.upgrade() {
                    SubsetCollection { inner }.proxy(event);
                }
            });
        *self.inner.binding.lock() = Some(listener);
    }

    /// Stop mirroring the parent. Membership is frozen from here on and
    /// write-through operations fail with [`CollectionError::Detached`].
    pub fn detach(&self) {
        let listener = self.inner.binding.lock().take();
        if let Some(listener) = listener {
            self.inner.parent.unsubscribe(listener);
            debug!(subset = self.id().0, "subset detached");
        }
    }

    pub fn is_detached(&self) -> bool {
        self.inner.binding.lock().is_none()
    }

    pub(super) fn ensure_bound(&self) -> Result<()> {
        if self.is_detached() {
            return Err(CollectionError::Detached(self.id()));
        }
        Ok(())
    }

    // --- Accessors ---

    /// Identity of the subset; events it originates on the parent carry it.
    pub fn id(&self) -> CollectionId {
        self.inner.store.id()
    }

    pub fn parent(&self) -> &ObservableCollection<M> {
        &self.inner.parent
    }

    pub fn live_update(&self) -> &LiveUpdate {
        &self.inner.live_update
    }

    pub fn comparator(&self) -> Option<Comparator<M>> {
        self.inner.store.comparator()
    }

    /// Run the sieve on `model`.
    pub fn accepts(&self, model: &M) -> bool {
        self.inner.sieve.accepts(model)
    }

    // --- Write-through mutations ---

    /// Add `model` to the parent. It shows up here, through the parent's
    /// event, only if the sieve accepts it.
    pub fn add(&self, model: M, options: MutationOptions) -> Result<bool> {
        self.ensure_bound()?;
        self.inner.parent.add(model, options)
    }

    /// Remove `model` from the parent, and therefore from this subset.
    pub fn remove(&self, model: &M, options: MutationOptions) -> Result<Option<M>> {
        self.ensure_bound()?;
        Ok(self.inner.parent.remove(model, options))
    }

    // --- Queries ---

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    pub fn contains(&self, model: &M) -> bool {
        self.inner.store.contains(model)
    }

    pub fn contains_key(&self, key: &ModelKey) -> bool {
        self.inner.store.contains_key(key)
    }

    pub fn get(&self, key: &ModelKey) -> Option<M> {
        self.inner.store.get(key)
    }

    pub fn get_by_id(&self, id: &ModelId) -> Option<M> {
        self.inner.store.get_by_id(id)
    }

    pub fn get_by_cid(&self, cid: Cid) -> Option<M> {
        self.inner.store.get_by_cid(cid)
    }

    pub fn index_of(&self, model: &M) -> Option<usize> {
        self.inner.store.index_of(model)
    }

    pub fn at(&self, index: usize) -> Option<M> {
        self.inner.store.at(index)
    }

    pub fn models(&self) -> Vec<M> {
        self.inner.store.models()
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        self.inner.store.keys()
    }

    pub fn each<F: FnMut(&M)>(&self, f: F) {
        self.inner.store.each(f)
    }

    pub fn pluck(&self, attribute: &str) -> Vec<Option<Value>> {
        self.inner.store.pluck(attribute)
    }

    // --- Events ---

    /// Listen to this subset's own events: membership adds and removes,
    /// resets, and attribute changes of members.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<M>) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(listener)
    }

    pub fn subscribe_channel(&self, buffer_size: usize) -> SubscriptionHandle<M> {
        self.inner.store.subscribe_channel(buffer_size)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.store.unsubscribe(id)
    }
}

impl<M: Model> fmt::Debug for SubsetCollection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsetCollection")
            .field("id", &self.id())
            .field("parent", &self.inner.parent.id())
            .field("len", &self.len())
            .field("live_update", &self.inner.live_update)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl<M: Model> Drop for SubsetInner<M> {
    fn drop(&mut self) {
        if let Some(listener) = self.binding.get_mut().take() {
            self.parent.unsubscribe(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::types::Origin;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn rank(d: &Document) -> i64 {
        d.get("rank").and_then(|v| v.as_i64()).unwrap_or(0)
    }

    fn ascending() -> Comparator<Document> {
        Arc::new(|a: &Document, b: &Document| rank(a).cmp(&rank(b)))
    }

    fn descending() -> Comparator<Document> {
        Arc::new(|a: &Document, b: &Document| rank(b).cmp(&rank(a)))
    }

    fn ranked_parent() -> ObservableCollection<Document> {
        ObservableCollection::from_models(vec![
            doc(json!({"id": 1, "rank": 1})),
            doc(json!({"id": 2, "rank": 3})),
            doc(json!({"id": 3, "rank": 2})),
            doc(json!({"id": 4})),
        ])
        .unwrap()
    }

    /// Sieve with pinned settings that records its hooks.
    struct Ranked {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Sieve<Document> for Ranked {
        fn accepts(&self, model: &Document) -> bool {
            model.get("rank").is_some()
        }

        fn comparator(&self) -> Option<Comparator<Document>> {
            Some(descending())
        }

        fn live_update(&self) -> Option<LiveUpdate> {
            Some(LiveUpdate::All)
        }

        fn before_initialize(&self, subset: &SubsetCollection<Document>, _: &SubsetOptions<Document>) {
            self.calls.lock().push(format!("before:{}", subset.len()));
        }

        fn initialize(&self, subset: &SubsetCollection<Document>, options: &SubsetOptions<Document>) {
            self.calls
                .lock()
                .push(format!("init:{}:{}", subset.len(), options.no_reset));
        }
    }

    #[test]
    fn test_construction_seeds_from_parent() {
        let parent = ranked_parent();
        let subset = SubsetCollection::new(
            &parent,
            |d: &Document| d.get("rank").is_some(),
            SubsetOptions::default(),
        )
        .unwrap();

        assert_eq!(subset.len(), 3);
        assert!(!subset.contains_key(&ModelKey::Id(ModelId::from(4u64))));
        assert_eq!(subset.live_update(), &LiveUpdate::Off);
        assert!(subset.comparator().is_none());
    }

    #[test]
    fn test_sieve_settings_win() {
        let parent = ranked_parent();
        parent.set_comparator(Some(ascending()));

        let calls = Arc::new(Mutex::new(Vec::new()));
        let subset = SubsetCollection::builder(
            &parent,
            Ranked {
                calls: Arc::clone(&calls),
            },
        )
        .comparator(ascending())
        .live_update(LiveUpdate::Off)
        .build()
        .unwrap();

        let ranks: Vec<i64> = subset.models().iter().map(rank).collect();
        assert_eq!(ranks, vec![3, 2, 1]);
        assert_eq!(subset.live_update(), &LiveUpdate::All);
        assert_eq!(*calls.lock(), vec!["before:0", "init:3:false"]);
    }

    #[test]
    fn test_options_win_over_parent() {
        let parent = ranked_parent();
        parent.set_comparator(Some(ascending()));

        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) > 0)
            .comparator(descending())
            .build()
            .unwrap();
        let ranks: Vec<i64> = subset.models().iter().map(rank).collect();
        assert_eq!(ranks, vec![3, 2, 1]);

        let inherited = SubsetCollection::builder(&parent, |d: &Document| rank(d) > 0)
            .build()
            .unwrap();
        let ranks: Vec<i64> = inherited.models().iter().map(rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_initial_models_are_written_through() {
        let parent = ranked_parent();
        let fresh = doc(json!({"id": 10, "rank": 7}));

        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) >= 7)
            .models(vec![fresh.clone()])
            .build()
            .unwrap();

        assert!(parent.contains(&fresh));
        assert_eq!(parent.len(), 5);
        assert_eq!(subset.models(), vec![fresh]);
    }

    #[test]
    fn test_no_reset_ignores_initial_models() {
        let parent = ranked_parent();
        let handle = parent.subscribe_channel(16);

        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) >= 2)
            .models(vec![doc(json!({"id": 10, "rank": 7}))])
            .no_reset(true)
            .build()
            .unwrap();

        assert_eq!(parent.len(), 4);
        assert_eq!(subset.len(), 2);
        assert!(handle.drain().is_empty());
    }

    #[test]
    fn test_detach_freezes_membership() {
        let parent = ranked_parent();
        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) > 0)
            .build()
            .unwrap();
        let listeners = parent.listener_count();

        subset.detach();
        assert!(subset.is_detached());
        assert_eq!(parent.listener_count(), listeners - 1);

        parent
            .add(doc(json!({"id": 5, "rank": 9})), MutationOptions::default())
            .unwrap();
        assert_eq!(subset.len(), 3);

        let result = subset.add(doc(json!({"id": 6, "rank": 1})), MutationOptions::default());
        assert!(matches!(result, Err(CollectionError::Detached(_))));
        let result = subset.reset(vec![], MutationOptions::default());
        assert!(matches!(result, Err(CollectionError::Detached(_))));
    }

    #[test]
    fn test_drop_unsubscribes_from_parent() {
        let parent = ranked_parent();
        let before = parent.listener_count();

        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) > 0)
            .build()
            .unwrap();
        let other_handle = subset.clone();
        assert_eq!(parent.listener_count(), before + 1);

        drop(subset);
        assert_eq!(parent.listener_count(), before + 1);
        drop(other_handle);
        assert_eq!(parent.listener_count(), before);
    }

    #[test]
    fn test_subset_events_carry_parent_origin() {
        let parent = ranked_parent();
        let subset = SubsetCollection::builder(&parent, |d: &Document| rank(d) > 0)
            .build()
            .unwrap();
        let handle = subset.subscribe_channel(8);

        parent
            .add(
                doc(json!({"id": 7, "rank": 4})),
                MutationOptions::default().with_origin(Origin::Collection(parent.id())),
            )
            .unwrap();

        match handle.try_recv().unwrap() {
            CollectionEvent::Added { origin, .. } => {
                assert_eq!(origin, Origin::Collection(parent.id()))
            }
            other => panic!("Expected Added event, got {:?}", other),
        }
    }
}
