/// Per-address async locks
///
/// One `tokio::sync::Mutex` per address, created on first use and dropped
/// again when the last holder or waiter lets go. Used to keep a whole sync
/// pass, or a sequence-number fetch through submission, from interleaving
/// with another one for the same address.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{StorageError, WalletError};
use crate::transaction::AccountAddress;

type LockTable = Arc<RwLock<HashMap<AccountAddress, Arc<Mutex<()>>>>>;

#[derive(Default, Clone)]
pub struct AddressLocks {
    locks: LockTable,
}

/// Exclusive access to one address
pub struct AddressGuard {
    guard: Option<OwnedMutexGuard<()>>,
    address: AccountAddress,
    locks: LockTable,
}

impl Drop for AddressGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Table write lock is held while checking, so no new clone can race in
        let Ok(mut locks) = self.locks.write() else {
            return;
        };
        if locks
            .get(&self.address)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.address);
        }
    }
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `address`; released when the guard drops
    pub async fn lock(&self, address: &AccountAddress) -> Result<AddressGuard, WalletError> {
        let mutex = self.get_or_create(address)?;
        let guard = mutex.lock_owned().await;
        Ok(AddressGuard {
            guard: Some(guard),
            address: *address,
            locks: self.locks.clone(),
        })
    }

    fn get_or_create(&self, address: &AccountAddress) -> Result<Arc<Mutex<()>>, WalletError> {
        // Fast path: read lock
        {
            let locks = self.locks.read().map_err(poisoned)?;
            if let Some(mutex) = locks.get(address) {
                return Ok(mutex.clone());
            }
        }

        let mut locks = self.locks.write().map_err(poisoned)?;
        Ok(locks
            .entry(*address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Number of addresses currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks.read().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> WalletError {
    StorageError::LockPoisoned("address locks".into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_address_is_exclusive() {
        let locks = AddressLocks::new();
        let address = AccountAddress::ONE;

        let guard = locks.lock(&address).await.unwrap();
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(&address).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        assert_eq!(locks.len(), 1);
        drop(guard);
        contender.await.unwrap().unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_addresses_do_not_block() {
        let locks = AddressLocks::new();
        let _first = locks.lock(&AccountAddress::ONE).await.unwrap();
        let _second = locks.lock(&AccountAddress::new([2; 32])).await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_addresses_are_dropped() {
        let locks = AddressLocks::new();
        for byte in 0..10u8 {
            let _guard = locks.lock(&AccountAddress::new([byte; 32])).await.unwrap();
        }
        assert!(locks.is_empty());

        // A waiter keeps the entry alive until it has been served
        let guard = locks.lock(&AccountAddress::ONE).await.unwrap();
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&AccountAddress::ONE).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
