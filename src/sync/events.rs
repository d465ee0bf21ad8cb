//! Wallet lifecycle notifications
//!
//! Listeners register per event kind and are called synchronously, in
//! registration order, on the emitting task. Nothing is queued or replayed.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{StorageError, WalletError};
use crate::storage::Wallet;
use crate::transaction::AccountAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WalletEventKind {
    NewWallet,
    WalletRemoved,
    WalletUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    NewWallet(Wallet),
    WalletRemoved(AccountAddress),
    WalletUpdated(Wallet),
}

impl WalletEvent {
    pub fn kind(&self) -> WalletEventKind {
        match self {
            Self::NewWallet(_) => WalletEventKind::NewWallet,
            Self::WalletRemoved(_) => WalletEventKind::WalletRemoved,
            Self::WalletUpdated(_) => WalletEventKind::WalletUpdated,
        }
    }
}

pub type Listener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

/// Handle returned by `subscribe`; pass it to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, (WalletEventKind, Listener)>,
}

#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: WalletEventKind, listener: F) -> Result<SubscriptionId, WalletError>
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().map_err(poisoned)?;
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.listeners.insert(id, (kind, Arc::new(listener)));
        Ok(id)
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, WalletError> {
        Ok(self.registry.write().map_err(poisoned)?.listeners.remove(&id).is_some())
    }

    /// Deliver `event` to every listener of its kind; returns how many ran
    pub fn emit(&self, event: &WalletEvent) -> usize {
        // Snapshot so listeners may (un)subscribe without deadlocking
        let listeners: Vec<Listener> = match self.registry.read() {
            Ok(registry) => registry
                .listeners
                .values()
                .filter(|(kind, _)| *kind == event.kind())
                .map(|(_, listener)| listener.clone())
                .collect(),
            Err(e) => {
                log::error!("Event registry poisoned, dropping {:?}: {}", event.kind(), e);
                return 0;
            }
        };

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

fn poisoned<T>(_: T) -> WalletError {
    StorageError::LockPoisoned("event registry".into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delivery_by_kind_and_unsubscribe() {
        let bus = EventBus::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let updated = Arc::new(AtomicUsize::new(0));

        let removed_id = {
            let removed = removed.clone();
            bus.subscribe(WalletEventKind::WalletRemoved, move |_| {
                removed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };
        {
            let updated = updated.clone();
            bus.subscribe(WalletEventKind::WalletUpdated, move |_| {
                updated.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert_eq!(bus.emit(&WalletEvent::WalletRemoved(AccountAddress::ONE)), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(updated.load(Ordering::SeqCst), 0);

        assert!(bus.unsubscribe(removed_id).unwrap());
        assert!(!bus.unsubscribe(removed_id).unwrap());
        assert_eq!(bus.emit(&WalletEvent::WalletRemoved(AccountAddress::ONE)), 0);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
