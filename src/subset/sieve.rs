//! Membership predicates.

use crate::model::Model;
use crate::types::{Comparator, LiveUpdate};

use super::{SubsetCollection, SubsetOptions};

/// Decides which parent models belong to a subset.
///
/// `accepts` runs on every parent mutation, every construction and every
/// resync. It must be cheap, must not mutate any collection, and should be
/// a pure function of the model's attributes.
///
/// Any `Fn(&M) -> bool` closure is a sieve. Implement the trait on a type to
/// also pin a comparator or live-update policy for every subset using it, or
/// to hook into construction.
pub trait Sieve<M: Model>: Send + Sync + 'static {
    fn accepts(&self, model: &M) -> bool;

    /// Ordering for subsets using this sieve. Takes precedence over
    /// [`SubsetOptions::comparator`] and the parent's comparator.
    fn comparator(&self) -> Option<Comparator<M>> {
        None
    }

    /// Live-update policy for subsets using this sieve. Takes precedence
    /// over [`SubsetOptions::live_update`].
    fn live_update(&self) -> Option<LiveUpdate> {
        None
    }

    /// Runs after the subset is bound to its parent, before it is seeded.
    fn before_initialize(&self, _subset: &SubsetCollection<M>, _options: &SubsetOptions<M>) {}

    /// Runs once the subset is seeded.
    fn initialize(&self, _subset: &SubsetCollection<M>, _options: &SubsetOptions<M>) {}
}

impl<M, F> Sieve<M> for F
where
    M: Model,
    F: Fn(&M) -> bool + Send + Sync + 'static,
{
    fn accepts(&self, model: &M) -> bool {
        self(model)
    }
}
