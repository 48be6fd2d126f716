//! Event types emitted by collections.

use crate::types::{ListenerId, ModelKey, Origin};

/// Events emitted by a collection, in the order the mutations were applied.
#[derive(Clone, Debug)]
pub enum CollectionEvent<M> {
    /// A model was inserted at `index`.
    Added {
        model: M,
        index: usize,
        origin: Origin,
    },

    /// A model was removed from `index`.
    Removed {
        model: M,
        index: usize,
        origin: Origin,
    },

    /// The contents were replaced wholesale.
    Reset {
        origin: Origin,
        /// Keys whose membership changed, when the reset only touched part
        /// of the collection. `None` means everything may have changed.
        model_ids: Option<Vec<ModelKey>>,
        /// True when the reset mirrors another collection's reset.
        proxied: bool,
        /// Collections mirroring this reset should do so silently.
        silent: bool,
    },

    /// A member's attributes changed. Emitted once per changed attribute
    /// (`Some(name)`), then once more with `None`.
    Changed {
        model: M,
        attribute: Option<String>,
    },

    /// The order was recomputed with the comparator.
    Sorted { origin: Origin },
}

impl<M> CollectionEvent<M> {
    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectionEvent::Added { .. } => "add",
            CollectionEvent::Removed { .. } => "remove",
            CollectionEvent::Reset { .. } => "reset",
            CollectionEvent::Changed { .. } => "change",
            CollectionEvent::Sorted { .. } => "sort",
        }
    }

    /// The model the event is about, if it concerns a single model.
    pub fn model(&self) -> Option<&M> {
        match self {
            CollectionEvent::Added { model, .. }
            | CollectionEvent::Removed { model, .. }
            | CollectionEvent::Changed { model, .. } => Some(model),
            CollectionEvent::Reset { .. } | CollectionEvent::Sorted { .. } => None,
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            CollectionEvent::Added { origin, .. }
            | CollectionEvent::Removed { origin, .. }
            | CollectionEvent::Reset { origin, .. }
            | CollectionEvent::Sorted { origin } => Some(*origin),
            CollectionEvent::Changed { .. } => None,
        }
    }
}

/// Handle to a channel subscription.
pub struct SubscriptionHandle<M> {
    pub id: ListenerId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<CollectionEvent<M>>,
}

impl<M> SubscriptionHandle<M> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<CollectionEvent<M>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<CollectionEvent<M>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<CollectionEvent<M>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every event currently buffered.
    pub fn drain(&self) -> Vec<CollectionEvent<M>> {
        self.receiver.try_iter().collect()
    }
}
