//! Repository contracts the wallet core is written against
//!
//! `Storage` implements all of them; callers with their own database can
//! implement the traits instead.

use async_trait::async_trait;

use super::models::{
    Balance, BlockMetadataTransaction, Coin, GenesisTransaction, LedgerTransaction, Movement,
    ScriptUserTransaction, SlowWallet, UserTransaction, Wallet, WalletBalance, WalletKey,
};
use crate::error::WalletError;
use crate::keys::{AuthKey, PublicKey};
use crate::transaction::AccountAddress;

#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Insert or replace the row for `key.public_key`
    async fn save_key(&self, key: &WalletKey) -> Result<(), WalletError>;

    async fn delete_key(&self, public_key: &PublicKey) -> Result<(), WalletError>;

    async fn get_wallet_key(&self, public_key: &PublicKey)
        -> Result<Option<WalletKey>, WalletError>;

    async fn get_wallet_key_from_auth_key(
        &self,
        auth_key: &AuthKey,
    ) -> Result<Option<WalletKey>, WalletError>;

    async fn get_wallet_keys(&self) -> Result<Vec<WalletKey>, WalletError>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Create the row, or return the existing one for `address` untouched
    async fn save_wallet(
        &self,
        address: AccountAddress,
        auth_key: AuthKey,
    ) -> Result<Wallet, WalletError>;

    async fn get_wallet(&self, address: &AccountAddress) -> Result<Option<Wallet>, WalletError>;

    async fn get_wallets(&self) -> Result<Vec<Wallet>, WalletError>;

    async fn get_wallets_from_auth_key(&self, auth_key: &AuthKey)
        -> Result<Vec<Wallet>, WalletError>;

    /// Returns false when no wallet has `address`
    async fn set_wallet_label(
        &self,
        address: &AccountAddress,
        label: &str,
    ) -> Result<bool, WalletError>;

    /// Returns false when no wallet has `address`
    async fn delete_wallet(&self, address: &AccountAddress) -> Result<bool, WalletError>;
}

#[async_trait]
pub trait CoinRepository: Send + Sync {
    /// Stable id per type tag; never creates a second row for the same tag
    async fn get_or_create_coin(&self, type_tag: &str) -> Result<Coin, WalletError>;

    async fn get_coin(&self, id: u64) -> Result<Option<Coin>, WalletError>;
}

/// Ledger-derived tables filled by the sync engine
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Upsert on (version, wallet_address); amount fields are overwritten
    async fn upsert_movements(&self, movements: &[Movement]) -> Result<usize, WalletError>;

    /// Insert keyed by version, ignoring conflicts; returns rows actually inserted
    async fn insert_transactions(
        &self,
        transactions: &[LedgerTransaction],
    ) -> Result<usize, WalletError>;

    /// Upsert on (coin_id, wallet_address); only `amount` is overwritten
    async fn upsert_balance(&self, balance: &Balance) -> Result<(), WalletError>;

    /// Upsert on wallet_address; `transferred` and `unlocked` are overwritten
    async fn upsert_slow_wallet(&self, slow_wallet: &SlowWallet) -> Result<(), WalletError>;

    /// Newest version first
    async fn get_movements(&self, address: &AccountAddress) -> Result<Vec<Movement>, WalletError>;

    async fn get_user_transactions(&self) -> Result<Vec<UserTransaction>, WalletError>;

    async fn get_script_user_transactions(&self)
        -> Result<Vec<ScriptUserTransaction>, WalletError>;

    async fn get_block_metadata_transactions(
        &self,
    ) -> Result<Vec<BlockMetadataTransaction>, WalletError>;

    async fn get_genesis_transactions(&self) -> Result<Vec<GenesisTransaction>, WalletError>;

    async fn get_balances(&self, address: &AccountAddress)
        -> Result<Vec<WalletBalance>, WalletError>;

    async fn get_slow_wallet(&self, address: &AccountAddress)
        -> Result<Option<SlowWallet>, WalletError>;
}
