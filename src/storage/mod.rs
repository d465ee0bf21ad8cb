//! Storage and persistence layer
//!
//! - Data models
//! - Repository traits
//! - File system backed `Storage`

mod file_system;
pub mod models;
pub mod repository;

pub use file_system::Storage;
pub use models::{
    Balance, BlockMetadataTransaction, Coin, GenesisTransaction, LedgerTransaction, Movement,
    ScriptUserTransaction, SlowWallet, TransactionKind, UserTransaction, Wallet, WalletBalance,
    WalletKey,
};
pub use repository::{CoinRepository, KeyRepository, LedgerStore, WalletRepository};
