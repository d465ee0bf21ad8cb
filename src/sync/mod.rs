//! Ledger state reconciliation
//!
//! - Sync engine (history and resource passes)
//! - Wallet lifecycle events
//! - Per-address locks

pub mod engine;
pub mod events;
pub mod locks;

pub use engine::{classify_edge, LedgerSyncEngine, SyncReport, DEFAULT_PAGE_SIZE};
pub use events::{EventBus, Listener, SubscriptionId, WalletEvent, WalletEventKind};
pub use locks::{AddressGuard, AddressLocks};
