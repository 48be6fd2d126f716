//! Construction options and builder for subsets.

use crate::collection::ObservableCollection;
use crate::error::Result;
use crate::model::Model;
use crate::types::{Comparator, LiveUpdate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Sieve, SubsetCollection};

/// Options for constructing a subset.
pub struct SubsetOptions<M: Model> {
    /// Initial members. When given (and `no_reset` is false), the subset
    /// writes them through to the parent as its contents.
    pub models: Option<Vec<M>>,

    /// Ordering, unless the sieve provides one. Falls back to the parent's.
    pub comparator: Option<Comparator<M>>,

    /// Live-update policy, unless the sieve provides one.
    /// Default: [`LiveUpdate::Off`].
    pub live_update: Option<LiveUpdate>,

    /// Skip the full reset sequence and only resynchronize against the
    /// parent's current contents.
    pub no_reset: bool,
}

impl<M: Model> SubsetOptions<M> {
    /// Options taken from a loaded [`SubsetConfig`].
    pub fn from_config(config: &SubsetConfig) -> Self {
        Self {
            live_update: config.live_update.clone(),
            no_reset: config.no_reset,
            ..Default::default()
        }
    }
}

impl<M: Model> Default for SubsetOptions<M> {
    fn default() -> Self {
        Self {
            models: None,
            comparator: None,
            live_update: None,
            no_reset: false,
        }
    }
}

impl<M: Model> Clone for SubsetOptions<M> {
    fn clone(&self) -> Self {
        Self {
            models: self.models.clone(),
            comparator: self.comparator.clone(),
            live_update: self.live_update.clone(),
            no_reset: self.no_reset,
        }
    }
}

impl<M: Model> fmt::Debug for SubsetOptions<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsetOptions")
            .field("models", &self.models.as_ref().map(Vec::len))
            .field("comparator", &self.comparator.is_some())
            .field("live_update", &self.live_update)
            .field("no_reset", &self.no_reset)
            .finish()
    }
}

/// Serializable subset settings, e.g. loaded from an application config
/// file.
///
/// ```json
/// { "live_update": ["status"], "no_reset": false }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetConfig {
    /// `"all"`, a list of attribute names, or absent/null to inherit.
    #[serde(default)]
    pub live_update: Option<LiveUpdate>,

    #[serde(default)]
    pub no_reset: bool,
}

/// Builder for [`SubsetCollection`].
pub struct SubsetBuilder<M: Model> {
    parent: ObservableCollection<M>,
    sieve: Box<dyn Sieve<M>>,
    options: SubsetOptions<M>,
}

impl<M: Model> SubsetBuilder<M> {
    pub fn new(parent: &ObservableCollection<M>, sieve: impl Sieve<M>) -> Self {
        Self {
            parent: parent.clone(),
            sieve: Box::new(sieve),
            options: SubsetOptions::default(),
        }
    }

    /// Seed the subset with these models, writing them through to the
    /// parent.
    pub fn models(mut self, models: Vec<M>) -> Self {
        self.options.models = Some(models);
        self
    }

    pub fn comparator(mut self, comparator: Comparator<M>) -> Self {
        self.options.comparator = Some(comparator);
        self
    }

    pub fn live_update(mut self, live_update: LiveUpdate) -> Self {
        self.options.live_update = Some(live_update);
        self
    }

    pub fn no_reset(mut self, no_reset: bool) -> Self {
        self.options.no_reset = no_reset;
        self
    }

    /// Apply settings from a config. Settings already made on the builder
    /// win over the config.
    pub fn config(mut self, config: &SubsetConfig) -> Self {
        if self.options.live_update.is_none() {
            self.options.live_update = config.live_update.clone();
        }
        self.options.no_reset |= config.no_reset;
        self
    }

    pub fn build(self) -> Result<SubsetCollection<M>> {
        SubsetCollection::from_parts(self.parent, self.sieve, self.options)
    }
}
