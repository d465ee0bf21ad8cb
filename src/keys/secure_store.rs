//! Secure key-value store for private key material
//!
//! The platform store itself is external; this module defines the contract
//! the keychain relies on plus two backends: an in-memory one for tests and a
//! file-backed one that keeps each entry in an owner-only file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use zeroize::Zeroizing;

use crate::error::{StorageError, WalletError};

/// Access rule attached to a stored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptedStoreRule {
    WhenUnlocked,
    /// Readable only while the device is unlocked; never synced or backed up
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlock,
    AfterFirstUnlockThisDeviceOnly,
}

impl EncryptedStoreRule {
    pub fn is_device_local(&self) -> bool {
        matches!(
            self,
            Self::WhenUnlockedThisDeviceOnly | Self::AfterFirstUnlockThisDeviceOnly
        )
    }
}

#[async_trait]
pub trait SecureKeyStore: Send + Sync {
    async fn set_item(
        &self,
        key: &str,
        value: &str,
        rule: EncryptedStoreRule,
    ) -> Result<(), WalletError>;

    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>, WalletError>;

    async fn remove_item(&self, key: &str) -> Result<(), WalletError>;
}

struct StoredItem {
    value: Zeroizing<String>,
    rule: EncryptedStoreRule,
}

/// Process-local store; contents vanish with the process
#[derive(Default)]
pub struct MemorySecureStore {
    items: RwLock<HashMap<String, StoredItem>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule recorded for `key`, if present
    pub fn rule_for(&self, key: &str) -> Option<EncryptedStoreRule> {
        self.items
            .read()
            .ok()
            .and_then(|items| items.get(key).map(|item| item.rule))
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> WalletError {
    StorageError::LockPoisoned("secure store".into()).into()
}

#[async_trait]
impl SecureKeyStore for MemorySecureStore {
    async fn set_item(
        &self,
        key: &str,
        value: &str,
        rule: EncryptedStoreRule,
    ) -> Result<(), WalletError> {
        let mut items = self.items.write().map_err(poisoned)?;
        items.insert(
            key.to_string(),
            StoredItem {
                value: Zeroizing::new(value.to_string()),
                rule,
            },
        );
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>, WalletError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(key).map(|item| item.value.clone()))
    }

    async fn remove_item(&self, key: &str) -> Result<(), WalletError> {
        self.items.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    value: String,
    rule: EncryptedStoreRule,
}

/// One `<key>.key` file per entry under `base_path`, mode 0600 on unix.
/// Only device-local rules are accepted.
#[derive(Clone)]
pub struct FileSecureStore {
    base_path: PathBuf,
}

impl FileSecureStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, WalletError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(WalletError::SecureStore(format!("invalid store key: {:?}", key)));
        }
        Ok(self.base_path.join(format!("{}.key", key)))
    }

    fn write_private(path: &PathBuf, contents: &[u8]) -> Result<(), StorageError> {
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }
        #[cfg(not(unix))]
        {
            fs::write(path, contents)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SecureKeyStore for FileSecureStore {
    async fn set_item(
        &self,
        key: &str,
        value: &str,
        rule: EncryptedStoreRule,
    ) -> Result<(), WalletError> {
        if !rule.is_device_local() {
            return Err(WalletError::SecureStore(format!(
                "file store only holds device-local entries, got {:?}",
                rule
            )));
        }
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.base_path).map_err(StorageError::from)?;

        let entry = FileEntry {
            value: value.to_string(),
            rule,
        };
        let json = Zeroizing::new(serde_json::to_vec(&entry).map_err(StorageError::from)?);
        drop(Zeroizing::new(entry.value));
        Self::write_private(&path, &json)?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>, WalletError> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = Zeroizing::new(fs::read(&path).map_err(StorageError::from)?);
        let entry: FileEntry = serde_json::from_slice(&contents).map_err(StorageError::from)?;
        Ok(Some(Zeroizing::new(entry.value)))
    }

    async fn remove_item(&self, key: &str) -> Result<(), WalletError> {
        let path = self.entry_path(key)?;
        if path.exists() {
            fs::remove_file(&path).map_err(StorageError::from)?;
        }
        Ok(())
    }
}
