use ed25519_dalek::Signer as _;
use sha3::{Digest, Sha3_256};
use std::sync::Arc;

use super::types::{
    AccountAddress, Ed25519PublicKey, Ed25519Signature, RawTransaction, SignedTransaction,
    TransactionAuthenticator,
};
use crate::error::WalletError;
use crate::keys::{AuthKey, Keychain, PrivateKey};
use crate::storage::WalletRepository;

/// Domain separator hashed in front of every raw transaction
pub const RAW_TRANSACTION_SALT: &[u8] = b"DIEM::RawTransaction";

/// sha3-256(salt) ‖ bcs(raw)
pub fn signing_message(raw_txn: &RawTransaction) -> Result<Vec<u8>, WalletError> {
    let prefix = Sha3_256::digest(RAW_TRANSACTION_SALT);
    let body = raw_txn.to_bcs()?;

    let mut message = Vec::with_capacity(prefix.len() + body.len());
    message.extend_from_slice(&prefix);
    message.extend_from_slice(&body);
    Ok(message)
}

pub fn sign_raw_transaction(
    raw_txn: RawTransaction,
    private_key: &PrivateKey,
) -> Result<SignedTransaction, WalletError> {
    let message = signing_message(&raw_txn)?;
    let signing_key = private_key.signing_key();
    let signature = signing_key.sign(&message);

    Ok(SignedTransaction {
        raw_txn,
        authenticator: TransactionAuthenticator::Ed25519 {
            public_key: Ed25519PublicKey(signing_key.verifying_key().to_bytes()),
            signature: Ed25519Signature(signature.to_bytes()),
        },
    })
}

/// Signs with the sender's key from the secure store
///
/// The key is found through address → wallet auth key → key row → store
/// entry. An address with no wallet row is tried as its own auth key.
pub struct Signer {
    wallets: Arc<dyn WalletRepository>,
    keychain: Arc<Keychain>,
}

impl Signer {
    pub fn new(wallets: Arc<dyn WalletRepository>, keychain: Arc<Keychain>) -> Self {
        Self { wallets, keychain }
    }

    pub async fn private_key_for(&self, address: &AccountAddress) -> Result<PrivateKey, WalletError> {
        let auth_key = match self.wallets.get_wallet(address).await? {
            Some(wallet) => wallet.auth_key,
            None => AuthKey::new(*address.as_bytes()),
        };

        let wallet_key = self
            .keychain
            .get_wallet_key_from_auth_key(&auth_key)
            .await?
            .ok_or_else(|| WalletError::KeyNotFound(address.to_hex_literal()))?;

        self.keychain
            .private_key(&wallet_key.public_key)
            .await
            .map_err(|e| match e {
                WalletError::KeyNotFound(_) => WalletError::KeyNotFound(address.to_hex_literal()),
                other => other,
            })
    }

    pub async fn sign(&self, raw_txn: RawTransaction) -> Result<SignedTransaction, WalletError> {
        let private_key = self.private_key_for(&raw_txn.sender).await?;
        let signed = sign_raw_transaction(raw_txn, &private_key)?;
        log::debug!(
            "Signed transaction {} #{}",
            signed.raw_txn.sender,
            signed.raw_txn.sequence_number
        );
        Ok(signed)
    }
}
