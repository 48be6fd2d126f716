//! # Subset Collections
//!
//! Live, predicate-filtered subsets of a shared parent collection.
//!
//! ## Core Concepts
//!
//! - **Models**: Entities with an optional id and an always-present cid
//! - **Collections**: Ordered, indexed model sets that emit typed events
//! - **Subsets**: Views of a parent filtered by a sieve, kept in sync through
//!   the parent's events
//! - **Write-through**: Subset `add`/`remove`/`reset` mutate the parent, which
//!   stays the single source of truth
//!
//! ## Example
//!
//! ```ignore
//! use subset_collections::{Document, LiveUpdate, MutationOptions, ObservableCollection, SubsetCollection};
//!
//! let tasks = ObservableCollection::<Document>::new();
//! let done = SubsetCollection::builder(&tasks, |t: &Document| t.get("done") == Some(json!(true)))
//!     .live_update(LiveUpdate::keys(["done"]))
//!     .build()?;
//!
//! let task = Document::from_value(json!({"id": 1, "done": false}))?;
//! tasks.add(task.clone(), MutationOptions::default())?;
//! assert!(done.is_empty());
//!
//! task.set("done", json!(true))?;
//! assert_eq!(done.len(), 1);
//! ```

pub mod collection;
pub mod error;
pub mod events;
pub mod model;
pub mod subset;
pub mod types;

// Re-exports
pub use collection::ObservableCollection;
pub use error::{CollectionError, Result};
pub use events::{Callback, CollectionEvent, ListenerRegistry, SubscriptionHandle};
pub use model::{Document, Model, ModelChange, Validator, Watcher};
pub use subset::{Sieve, SubsetBuilder, SubsetCollection, SubsetConfig, SubsetOptions};
pub use types::*;
