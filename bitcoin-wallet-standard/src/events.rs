//! Listener registries for the two provider contracts.
//!
//! One generic registry, instantiated twice: once for the capability-map
//! surface (the `change` event carrying account lists) and once for the
//! legacy provider surface (`accountChange` / `disconnect`). Dispatch runs
//! over a snapshot of the listener list taken when the event is emitted, so
//! registrations and removals racing a dispatch only affect later events.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use crate::account::Account;
use crate::satsconnect::Address;

type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Listener<P: 'static> {
    id: u64,
    callback: Callback<P>,
}

struct RegistryState<K, P: 'static> {
    next_id: u64,
    listeners: HashMap<K, Vec<Listener<P>>>,
}

/// Listener registry for one event surface.
///
/// `K` is the topic enum, `P` the payload delivered to listeners.
pub struct EventRegistry<K, P: 'static> {
    state: Arc<Mutex<RegistryState<K, P>>>,
}

impl<K, P> Clone for EventRegistry<K, P> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<K, P> Default for EventRegistry<K, P> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState { next_id: 0, listeners: HashMap::new() })),
        }
    }
}

impl<K, P> EventRegistry<K, P>
where
    K: Copy + Eq + Hash + Send + 'static,
    P: 'static,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`.
    ///
    /// The returned subscription is the only way to remove this exact
    /// registration. Dropping it without calling
    /// [`EventSubscription::unsubscribe`] leaves the listener in place.
    pub fn on(
        &self,
        kind: K,
        callback: impl Fn(&P) + Send + Sync + 'static,
    ) -> EventSubscription {
        let id = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let id = state.next_id;
            state.next_id += 1;
            state
                .listeners
                .entry(kind)
                .or_default()
                .push(Listener { id, callback: Arc::new(callback) });
            id
        };
        let state = Arc::clone(&self.state);
        EventSubscription {
            remove: Box::new(move || {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(listeners) = state.listeners.get_mut(&kind) {
                    listeners.retain(|listener| listener.id != id);
                }
            }),
        }
    }

    /// Deliver `payload` to every listener registered for `kind`.
    ///
    /// No-op when the topic has no listeners.
    pub fn emit(&self, kind: K, payload: &P) {
        let snapshot: Vec<Callback<P>> = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state
                .listeners
                .get(&kind)
                .map(|listeners| {
                    listeners.iter().map(|listener| Arc::clone(&listener.callback)).collect()
                })
                .unwrap_or_default()
        };
        for callback in snapshot {
            callback(payload);
        }
    }
}

impl<K, P> fmt::Debug for EventRegistry<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .values()
            .map(Vec::len)
            .sum::<usize>();
        f.debug_struct("EventRegistry").field("listeners", &count).finish()
    }
}

/// Capability to remove one listener registration.
///
/// Removal happens only through [`unsubscribe`](Self::unsubscribe); dropping
/// the subscription keeps the listener registered. Removing a registration
/// that is already gone is a no-op.
#[must_use = "dropping the subscription keeps the listener registered"]
pub struct EventSubscription {
    remove: Box<dyn FnOnce() + Send>,
}

impl EventSubscription {
    /// Remove the listener this subscription was returned for.
    pub fn unsubscribe(self) {
        (self.remove)();
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription").finish_non_exhaustive()
    }
}

/// Topics of the capability-map event surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardEventKind {
    /// Account list changed.
    Change,
}

/// Payload of a [`StandardEventKind::Change`] dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeEvent {
    /// The accounts now exposed; empty after a disconnect.
    pub accounts: Vec<Account>,
}

/// Topics of the legacy provider event surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    /// Selected account changed.
    AccountChange,
    /// Wallet disconnected.
    Disconnect,
}

/// Payload delivered to legacy provider listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Selected account changed; carries the new address records.
    AccountChange {
        /// Address records for the now-current account.
        addresses: Vec<Address>,
    },
    /// Wallet disconnected.
    Disconnect,
}
