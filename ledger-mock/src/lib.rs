/// Ledger Mock Server Library
///
/// In-memory stand-in for the Open Libra indexer and REST API, usable as a
/// standalone binary or spawned inside integration tests.

pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use server::{create_router, run_server, spawn_server};
pub use state::{normalize_address, MockAccount, MockLedger};
pub use types::*;
