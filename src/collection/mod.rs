//! Observable collections.
//!
//! An [`ObservableCollection`] keeps its members in order (by comparator
//! when one is set, by insertion otherwise), indexes them by id and cid, and
//! announces each mutation as a [`CollectionEvent`](crate::events::CollectionEvent).

mod observable;
mod state;

pub use observable::ObservableCollection;
