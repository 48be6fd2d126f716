//! Models stored in collections.
//!
//! Collections are generic over the [`Model`] trait. [`Document`] is the
//! stock implementation: a bag of JSON attributes with change watchers.

use crate::error::{CollectionError, Result};
use crate::types::{Cid, ModelId, ModelKey, WatchId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Attribute names that changed in one update of a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelChange {
    pub cid: Cid,
    pub attributes: Vec<String>,
}

/// Callback invoked after a model's attributes change.
pub type Watcher = Arc<dyn Fn(&ModelChange) + Send + Sync>;

/// Validation hook run before attribute changes are committed.
pub type Validator = Arc<dyn Fn(&Map<String, Value>) -> std::result::Result<(), String> + Send + Sync>;

/// An entity that can live in a collection.
///
/// Clones must be handles to the same entity: a clone shares the cid and
/// observes the same attribute changes.
pub trait Model: Clone + Send + Sync + 'static {
    /// Application-assigned id, if the model has one.
    fn id(&self) -> Option<ModelId>;

    /// Client id, stable for the life of the model.
    fn cid(&self) -> Cid;

    /// Identity used for membership tests.
    fn key(&self) -> ModelKey {
        match self.id() {
            Some(id) => ModelKey::Id(id),
            None => ModelKey::Cid(self.cid()),
        }
    }

    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Check the model before it enters a collection.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Register a change watcher. Models that never change return `None`.
    fn watch(&self, _watcher: Watcher) -> Option<WatchId> {
        None
    }

    fn unwatch(&self, _id: WatchId) {}
}

/// A model backed by a JSON attribute map.
///
/// The `id` attribute, when it holds a string or a number at construction,
/// becomes the model id and cannot be changed afterwards.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

struct DocumentInner {
    cid: Cid,
    id: Option<ModelId>,
    attributes: RwLock<Map<String, Value>>,
    validator: Option<Validator>,
    watchers: Mutex<Vec<(WatchId, Watcher)>>,
    next_watch: AtomicU64,
}

impl Document {
    /// Create a document from an attribute map.
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self::build(attributes, None)
    }

    /// Convert raw JSON into a document. Only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(attributes) => Ok(Self::new(attributes)),
            other => Err(CollectionError::InvalidFormat(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Create a document whose attributes must satisfy `validator`, now and
    /// on every later update.
    pub fn with_validator(attributes: Map<String, Value>, validator: Validator) -> Result<Self> {
        let doc = Self::build(attributes, Some(validator));
        doc.validate().map_err(|reason| CollectionError::InvalidModel {
            key: doc.key(),
            reason,
        })?;
        Ok(doc)
    }

    fn build(attributes: Map<String, Value>, validator: Option<Validator>) -> Self {
        let id = attributes.get("id").and_then(ModelId::from_value);
        Self {
            inner: Arc::new(DocumentInner {
                cid: Cid::next(),
                id,
                attributes: RwLock::new(attributes),
                validator,
                watchers: Mutex::new(Vec::new()),
                next_watch: AtomicU64::new(1),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.attributes.read().get(name).cloned()
    }

    /// Snapshot of every attribute.
    pub fn attributes(&self) -> Map<String, Value> {
        self.inner.attributes.read().clone()
    }

    /// Set one attribute. Returns whether the value changed.
    pub fn set(&self, name: impl Into<String>, value: Value) -> Result<bool> {
        let changed = self.apply(vec![(name.into(), Some(value))])?;
        Ok(!changed.is_empty())
    }

    /// Set several attributes at once; watchers see a single change listing
    /// every attribute whose value actually changed.
    pub fn update<I, K>(&self, changes: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.apply(
            changes
                .into_iter()
                .map(|(name, value)| (name.into(), Some(value)))
                .collect(),
        )
    }

    /// Remove an attribute, returning its previous value.
    pub fn unset(&self, name: &str) -> Result<Option<Value>> {
        let previous = self.get(name);
        self.apply(vec![(name.to_string(), None)])?;
        Ok(previous)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// Number of watchers currently registered.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    fn apply(&self, changes: Vec<(String, Option<Value>)>) -> Result<Vec<String>> {
        let changed = {
            let mut attributes = self.inner.attributes.write();
            let mut proposed = attributes.clone();
            let mut changed = Vec::new();

            for (name, value) in changes {
                if name == "id" {
                    let next = value.as_ref().and_then(ModelId::from_value);
                    if next != self.inner.id {
                        return Err(CollectionError::ImmutableId(self.key()));
                    }
                }
                let previous = match value {
                    Some(value) => proposed.insert(name.clone(), value),
                    None => proposed.remove(&name),
                };
                if previous.as_ref() != proposed.get(&name) && !changed.contains(&name) {
                    changed.push(name);
                }
            }

            if changed.is_empty() {
                return Ok(changed);
            }

            if let Some(validator) = &self.inner.validator {
                validator(&proposed).map_err(|reason| CollectionError::InvalidModel {
                    key: self.key(),
                    reason,
                })?;
            }

            *attributes = proposed;
            changed
        };

        self.notify(&changed);
        Ok(changed)
    }

    fn notify(&self, attributes: &[String]) {
        let watchers: Vec<Watcher> = self
            .inner
            .watchers
            .lock()
            .iter()
            .map(|(_, watcher)| Arc::clone(watcher))
            .collect();

        let change = ModelChange {
            cid: self.inner.cid,
            attributes: attributes.to_vec(),
        };
        for watcher in watchers {
            watcher(&change);
        }
    }
}

impl Model for Document {
    fn id(&self) -> Option<ModelId> {
        self.inner.id.clone()
    }

    fn cid(&self) -> Cid {
        self.inner.cid
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match &self.inner.validator {
            Some(validator) => validator(&self.inner.attributes.read()),
            None => Ok(()),
        }
    }

    fn watch(&self, watcher: Watcher) -> Option<WatchId> {
        let id = WatchId(self.inner.next_watch.fetch_add(1, Ordering::SeqCst));
        self.inner.watchers.lock().push((id, watcher));
        Some(id)
    }

    fn unwatch(&self, id: WatchId) {
        self.inner.watchers.lock().retain(|(watch, _)| *watch != id);
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.inner.cid == other.inner.cid
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("cid", &self.inner.cid)
            .field("id", &self.inner.id)
            .field("attributes", &*self.inner.attributes.read())
            .finish()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.attributes.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Document::new)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
