//! Core identifier and option types shared by collections and subsets.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);
static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Client-side identifier of a model.
///
/// Always present and unique for the lifetime of the process, so it can
/// identify models that have not been assigned an id yet.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cid(pub u64);

impl Cid {
    /// Allocate a fresh client id.
    pub fn next() -> Self {
        Cid(NEXT_CID.fetch_add(1, AtomicOrdering::SeqCst))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Application-assigned model id.
///
/// Numeric and string ids are both normalized to their string form, so
/// `ModelId::from(7)` and `ModelId::from("7")` name the same model.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id out of a JSON attribute value. Only strings and numbers
    /// qualify.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ModelId(s.clone())),
            serde_json::Value::Number(n) => Some(ModelId(n.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        ModelId(s.to_string())
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        ModelId(s)
    }
}

impl From<u64> for ModelId {
    fn from(n: u64) -> Self {
        ModelId(n.to_string())
    }
}

impl From<i64> for ModelId {
    fn from(n: i64) -> Self {
        ModelId(n.to_string())
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({})", self.0)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membership identity of a model: its id when it has one, else its cid.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKey {
    Id(ModelId),
    Cid(Cid),
}

impl From<ModelId> for ModelKey {
    fn from(id: ModelId) -> Self {
        ModelKey::Id(id)
    }
}

impl From<Cid> for ModelKey {
    fn from(cid: Cid) -> Self {
        ModelKey::Cid(cid)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKey::Id(id) => write!(f, "{}", id),
            ModelKey::Cid(cid) => write!(f, "{}", cid),
        }
    }
}

/// Identity of a collection instance (parents and subset stores alike).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionId(pub u64);

impl CollectionId {
    pub fn next() -> Self {
        CollectionId(NEXT_COLLECTION_ID.fetch_add(1, AtomicOrdering::SeqCst))
    }
}

impl fmt::Debug for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionId({})", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for an event listener registered on a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for a change watcher registered on a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Where a mutation came from.
///
/// Carried on every event so that subsets can tell whether they caused it
/// and whether they are allowed to mirror it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    /// Requested directly by application code.
    #[default]
    Direct,
    /// Requested on behalf of the given collection.
    Collection(CollectionId),
    /// Subsets must not mirror this mutation.
    Unproxied,
}

impl Origin {
    /// Whether the collection `id` may react to an event with this origin.
    pub fn admits(&self, id: CollectionId) -> bool {
        match self {
            Origin::Direct => true,
            Origin::Collection(origin) => *origin != id,
            Origin::Unproxied => false,
        }
    }

    /// Whether this origin names the collection `id`.
    pub fn is(&self, id: CollectionId) -> bool {
        *self == Origin::Collection(id)
    }
}

/// Options accepted by every mutating collection operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Suppress event emission.
    pub silent: bool,
    /// Provenance stamped onto emitted events.
    pub origin: Origin,
    /// Marks a reset performed in reaction to another collection's event.
    pub proxied: bool,
}

impl MutationOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Default::default()
        }
    }

    pub fn unproxied() -> Self {
        Self {
            origin: Origin::Unproxied,
            ..Default::default()
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }
}

/// Ordering function used to keep a collection sorted.
pub type Comparator<M> = Arc<dyn Fn(&M, &M) -> Ordering + Send + Sync>;

/// When a subset re-evaluates membership after a model attribute change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LiveUpdate {
    /// Attribute changes never affect membership.
    #[default]
    Off,
    /// Any attribute change re-evaluates membership.
    All,
    /// Only changes to the named attributes re-evaluate membership.
    Keys(BTreeSet<String>),
}

impl LiveUpdate {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LiveUpdate::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Whether a change notification for `attribute` (`None` for the generic
    /// change notification) should trigger a membership check.
    pub fn tracks(&self, attribute: Option<&str>) -> bool {
        match (self, attribute) {
            (LiveUpdate::All, None) => true,
            (LiveUpdate::Keys(keys), Some(attribute)) => keys.contains(attribute),
            _ => false,
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, LiveUpdate::Off)
    }
}

impl Serialize for LiveUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LiveUpdate::Off => serializer.serialize_none(),
            LiveUpdate::All => serializer.serialize_str("all"),
            LiveUpdate::Keys(keys) => keys.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LiveUpdateRepr {
    Token(String),
    Keys(Vec<String>),
}

impl<'de> Deserialize<'de> for LiveUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<LiveUpdateRepr>::deserialize(deserializer)? {
            None => Ok(LiveUpdate::Off),
            Some(LiveUpdateRepr::Token(token)) => match token.as_str() {
                "all" => Ok(LiveUpdate::All),
                "none" => Ok(LiveUpdate::Off),
                other => Err(D::Error::custom(format!(
                    "unknown live update policy: {other}"
                ))),
            },
            Some(LiveUpdateRepr::Keys(keys)) => Ok(LiveUpdate::keys(keys)),
        }
    }
}
