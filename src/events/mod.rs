//! Typed events for live collection updates.
//!
//! Every collection owns a [`ListenerRegistry`]. Listeners are either
//! callbacks, invoked synchronously after each mutation, or bounded channels
//! that buffer events for a consumer to drain later.
//!
//! # Example
//!
//! ```ignore
//! let notes = ObservableCollection::<Document>::new();
//! let handle = notes.subscribe_channel(64);
//!
//! notes.add(Document::from_value(json!({"id": 1}))?, MutationOptions::default())?;
//!
//! for event in handle.drain() {
//!     match event {
//!         CollectionEvent::Added { model, index, .. } => println!("{:?} at {}", model, index),
//!         other => println!("{}", other.kind()),
//!     }
//! }
//! ```

mod registry;
mod types;

pub use registry::{Callback, ListenerRegistry};
pub use types::{CollectionEvent, SubscriptionHandle};
