//! Subset collections: live, filtered views that write through to a parent.
//!
//! A [`SubsetCollection`] listens to its parent and keeps its own membership
//! store in step with it:
//! - parent adds and removes are mirrored when the [`Sieve`] accepts the model
//! - parent resets trigger a resync, unless the reset was a targeted one
//!   from a sibling subset that touched none of this subset's models
//! - attribute changes re-evaluate membership according to [`LiveUpdate`](crate::LiveUpdate)
//!
//! Mutations go the other way: `add`, `remove` and `reset` on a subset change
//! the parent, and the subset picks the result up from the parent's events.
//!
//! # Example
//!
//! ```ignore
//! let tasks = ObservableCollection::<Document>::new();
//!
//! let active = SubsetCollection::builder(&tasks, |task: &Document| {
//!     task.get("status") == Some(json!("active"))
//! })
//! .live_update(LiveUpdate::keys(["status"]))
//! .build()?;
//!
//! // Lands in the parent, and in `active` through the parent's event.
//! active.add(Document::from_value(json!({"id": 1, "status": "active"}))?, MutationOptions::default())?;
//! ```

mod collection;
mod options;
mod proxy;
mod reconcile;
mod sieve;

pub use collection::SubsetCollection;
pub use options::{SubsetBuilder, SubsetConfig, SubsetOptions};
pub use reconcile::xor;
pub use sieve::Sieve;
