//! Libra Wallet: custodial-key wallet core for an Open Libra (Diem/Aptos-style) ledger
//!
//! This crate keeps Ed25519 key material in a secure store, mirrors an
//! account's on-chain history and resources into local storage, and builds,
//! signs and submits BCS-encoded transactions.
//!
//! # Architecture
//!
//! - **Keychain**: mnemonic → SLIP-0010 ed25519 key, public half in the key
//!   repository, private half in the secure store
//! - **Ledger Sync Engine**: idempotent merge of indexer movements and RPC
//!   resources, one sync per address at a time
//! - **Transaction pipeline**: builder, domain-separated signer and submitter
//!   under a per-sender lock
//!
//! # Example
//!
//! ```ignore
//! use libra_wallet::{LedgerConfig, WalletManager};
//!
//! let manager = WalletManager::new(LedgerConfig::from_env())?;
//!
//! let wallet = manager.import_mnemonic("abandon abandon ... about").await?;
//! let report = manager.sync_wallet(&wallet.address).await?;
//! println!("{} movements merged", report.movements);
//!
//! let hash = manager.set_slow(&wallet.address).await?;
//! ```

// Public modules
pub mod config;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod manager;
pub mod storage;
pub mod sync;
pub mod transaction;

// Re-exports for convenience
pub use config::LedgerConfig;
pub use error::{StorageError, WalletError};
pub use keys::{
    AuthKey, EncryptedStoreRule, FileSecureStore, Keychain, MemorySecureStore, PrivateKey,
    PublicKey, SecureKeyStore,
};
pub use ledger::{GraphQlIndexer, IndexerClient, RestClient, RpcClient};
pub use manager::WalletManager;
pub use storage::{Storage, Wallet, WalletKey};
pub use sync::{LedgerSyncEngine, SyncReport, WalletEvent, WalletEventKind};
pub use transaction::{
    AccountAddress, RawTransaction, SignedTransaction, SubmittedTransaction, TransactionManager,
};

pub type Result<T> = std::result::Result<T, WalletError>;
