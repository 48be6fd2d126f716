//! Listener registry for dispatching collection events.

use crate::types::ListenerId;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{CollectionEvent, SubscriptionHandle};

/// Callback listener.
pub type Callback<M> = Arc<dyn Fn(&CollectionEvent<M>) + Send + Sync>;

enum Listener<M> {
    Callback(Callback<M>),
    Channel(Sender<CollectionEvent<M>>),
}

impl<M> Clone for Listener<M> {
    fn clone(&self) -> Self {
        match self {
            Listener::Callback(callback) => Listener::Callback(Arc::clone(callback)),
            Listener::Channel(sender) => Listener::Channel(sender.clone()),
        }
    }
}

/// Registered listeners of one collection, in registration order.
///
/// Dispatch runs on the caller's thread. The listener list is snapshotted
/// before any listener runs, so listeners may subscribe, unsubscribe or
/// mutate collections re-entrantly.
pub struct ListenerRegistry<M> {
    listeners: RwLock<Vec<(ListenerId, Listener<M>)>>,
    /// Counter for generating listener IDs.
    next_id: AtomicU64,
}

impl<M: Clone> ListenerRegistry<M> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a callback listener.
    pub fn subscribe(&self, callback: Callback<M>) -> ListenerId {
        let id = self.allocate();
        self.listeners.write().push((id, Listener::Callback(callback)));
        id
    }

    /// Register a channel listener with room for `buffer_size` events.
    ///
    /// A channel subscriber whose buffer is full when an event arrives is
    /// dropped.
    pub fn subscribe_channel(&self, buffer_size: usize) -> SubscriptionHandle<M> {
        let id = self.allocate();
        let (sender, receiver) = bounded(buffer_size);
        self.listeners.write().push((id, Listener::Channel(sender)));
        SubscriptionHandle { id, receiver }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener. Drops channel subscribers that
    /// fail to receive.
    pub fn emit(&self, event: &CollectionEvent<M>) {
        let snapshot: Vec<(ListenerId, Listener<M>)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        let mut to_remove = Vec::new();
        for (id, listener) in snapshot {
            match listener {
                Listener::Callback(callback) => callback(event),
                Listener::Channel(sender) => match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(listener = id.0, "dropping slow channel subscriber");
                        to_remove.push(id);
                    }
                    Err(TrySendError::Disconnected(_)) => to_remove.push(id),
                },
            }
        }

        if !to_remove.is_empty() {
            self.listeners
                .write()
                .retain(|(id, _)| !to_remove.contains(id));
        }
    }
}

impl<M: Clone> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
