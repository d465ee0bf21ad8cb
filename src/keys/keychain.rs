use std::sync::Arc;
use zeroize::Zeroizing;

use super::derivation::{mnemonic_to_private_key, public_key_to_auth_key, AuthKey, PrivateKey, PublicKey};
use super::secure_store::{EncryptedStoreRule, SecureKeyStore};
use crate::error::WalletError;
use crate::storage::{KeyRepository, WalletKey};

/// Key lifecycle: derive, persist the public half, park the private half
/// in the secure store under `hex_upper(public_key)`.
pub struct Keychain {
    repository: Arc<dyn KeyRepository>,
    secure_store: Arc<dyn SecureKeyStore>,
}

impl Keychain {
    pub fn new(repository: Arc<dyn KeyRepository>, secure_store: Arc<dyn SecureKeyStore>) -> Self {
        Self {
            repository,
            secure_store,
        }
    }

    pub async fn new_key_from_mnemonic(&self, mnemonic: &str) -> Result<WalletKey, WalletError> {
        let private_key = mnemonic_to_private_key(mnemonic)?;
        self.new_key_from_private_key(&private_key).await
    }

    /// Repository row first, then the secure store entry. If the store write
    /// fails a row written by this call is removed again so no key is left
    /// without its secret. A row that was already there is kept.
    pub async fn new_key_from_private_key(
        &self,
        private_key: &PrivateKey,
    ) -> Result<WalletKey, WalletError> {
        let public_key = private_key.public_key();
        let wallet_key = WalletKey {
            public_key,
            auth_key: public_key_to_auth_key(&public_key),
        };

        let existed = self.repository.get_wallet_key(&public_key).await?.is_some();
        self.repository.save_key(&wallet_key).await?;

        let store_result = self
            .secure_store
            .set_item(
                &wallet_key.store_key(),
                &private_key.to_hex_upper(),
                EncryptedStoreRule::WhenUnlockedThisDeviceOnly,
            )
            .await;

        if let Err(e) = store_result {
            log::error!("❌ Secure store write failed for key {}: {}", public_key, e);
            if !existed {
                if let Err(cleanup) = self.repository.delete_key(&public_key).await {
                    log::error!("Could not remove key row {} after failed import: {}", public_key, cleanup);
                }
            }
            return Err(match e {
                WalletError::SecureStore(message) => WalletError::SecureStore(message),
                other => WalletError::SecureStore(other.to_string()),
            });
        }

        log::info!("🔑 Imported key {} (auth key {})", public_key, wallet_key.auth_key);
        Ok(wallet_key)
    }

    pub async fn get_wallet_key_from_auth_key(
        &self,
        auth_key: &AuthKey,
    ) -> Result<Option<WalletKey>, WalletError> {
        self.repository.get_wallet_key_from_auth_key(auth_key).await
    }

    pub async fn get_wallet_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<WalletKey>, WalletError> {
        self.repository.get_wallet_key(public_key).await
    }

    pub async fn get_wallet_keys(&self) -> Result<Vec<WalletKey>, WalletError> {
        self.repository.get_wallet_keys().await
    }

    /// Load the private key for `public_key` from the secure store
    pub async fn private_key(&self, public_key: &PublicKey) -> Result<PrivateKey, WalletError> {
        let stored: Zeroizing<String> = self
            .secure_store
            .get_item(&public_key.to_hex_upper())
            .await?
            .ok_or_else(|| WalletError::KeyNotFound(public_key.to_hex_upper()))?;

        let private_key = PrivateKey::from_hex(&stored)?;
        if private_key.public_key() != *public_key {
            return Err(WalletError::InvalidKey(format!(
                "secure store entry {} holds a different key",
                public_key.to_hex_upper()
            )));
        }
        Ok(private_key)
    }

    /// Key rows with no secure store entry; re-import them from the mnemonic
    pub async fn find_orphaned_keys(&self) -> Result<Vec<WalletKey>, WalletError> {
        let mut orphaned = Vec::new();
        for key in self.repository.get_wallet_keys().await? {
            if self.secure_store.get_item(&key.store_key()).await?.is_none() {
                log::warn!("⚠️  Key {} has no private key in the secure store", key.public_key);
                orphaned.push(key);
            }
        }
        Ok(orphaned)
    }
}
