#![allow(dead_code)]

/// Common test utilities for wallet integration tests
///
/// Every test gets its own in-process ledger mock on an ephemeral port, a
/// temp directory for storage and an in-memory secure store.

use std::sync::Arc;

use ledger_mock::{spawn_server, MockLedger};
use libra_wallet::storage::Storage;
use libra_wallet::{
    AccountAddress, GraphQlIndexer, LedgerConfig, MemorySecureStore, RestClient, WalletManager,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const TEST_PRIVATE_KEY: &str =
    "cc92c0eaf80206d817f150e21917f797e49cf644a33ac514de3c316baa2f1bf5";
pub const TEST_PUBLIC_KEY: &str =
    "a686f0309ab80312979606cfccc10ea2740147ae6888351488d11c46f08fbf60";
pub const TEST_AUTH_KEY: &str =
    "eb663b681209e7087d681c5d3eed12aaa8e1915e7c87794542c3f96e94b3d3bf";

pub const LIBRA_COIN: &str = "0x1::libra_coin::LibraCoin";

pub fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

pub fn test_address() -> AccountAddress {
    AccountAddress::from_hex(TEST_AUTH_KEY).unwrap()
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub ledger: Arc<MockLedger>,
    pub config: LedgerConfig,
    pub storage: Arc<Storage>,
    pub secure_store: Arc<MemorySecureStore>,
    pub manager: WalletManager,
}

impl TestEnvironment {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Start a mock ledger and build a manager against it, letting the
    /// caller adjust the config first
    pub async fn with_config(adjust: impl FnOnce(&mut LedgerConfig)) -> anyhow::Result<Self> {
        init_logging();

        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());

        let ledger = Arc::new(MockLedger::new());
        let addr = spawn_server(ledger.clone()).await?;

        let mut config = LedgerConfig::for_local(&format!("http://{}", addr));
        config.data_dir = temp_dir.path().to_path_buf();
        adjust(&mut config);

        let storage = Arc::new(Storage::new_with_base_dir(temp_dir.path().join("db"))?);
        let secure_store = Arc::new(MemorySecureStore::new());
        let manager = build_manager(&config, storage.clone(), secure_store.clone())?;

        Ok(Self {
            temp_dir,
            ledger,
            config,
            storage,
            secure_store,
            manager,
        })
    }

    /// A second manager over the same storage and secure store
    pub fn reopen(&self) -> anyhow::Result<WalletManager> {
        let storage = Arc::new(Storage::new_with_base_dir(self.temp_dir.path().join("db"))?);
        build_manager(&self.config, storage, self.secure_store.clone())
    }
}

pub fn build_manager(
    config: &LedgerConfig,
    storage: Arc<Storage>,
    secure_store: Arc<MemorySecureStore>,
) -> anyhow::Result<WalletManager> {
    let indexer = Arc::new(GraphQlIndexer::new(config)?);
    let rpc = Arc::new(RestClient::new(config)?);
    Ok(WalletManager::with_components(
        config.clone(),
        storage,
        secure_store,
        indexer,
        rpc,
    ))
}

/// A localhost URL nothing is listening on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// ============================================================================
// Indexer movement fixtures
// ============================================================================

pub fn hash_for(version: u64) -> String {
    format!("0x{:064x}", version)
}

fn movement(version: u64, balance: &str, transaction: Value) -> Value {
    json!({
        "amount": "100",
        "unlockedAmount": "100",
        "lockedAmount": "0",
        "balance": balance,
        "lockedBalance": "0",
        "version": version.to_string(),
        "transaction": transaction,
    })
}

pub fn user_movement(version: u64, balance: &str) -> Value {
    movement(
        version,
        balance,
        json!({
            "__typename": "UserTransaction",
            "version": version.to_string(),
            "hash": hash_for(version),
            "sender": format!("0x{}", TEST_AUTH_KEY),
            "moduleAddress": "0x1",
            "moduleName": "ol_account",
            "functionName": "transfer",
            "arguments": "[\"0x2\",\"100\"]",
            "success": true,
            "timestamp": "1700000000000000",
        }),
    )
}

pub fn script_movement(version: u64) -> Value {
    movement(
        version,
        "0",
        json!({
            "__typename": "ScriptUserTransaction",
            "version": version.to_string(),
            "hash": hash_for(version),
            "sender": format!("0x{}", TEST_AUTH_KEY),
            "success": false,
            "timestamp": "1700000000000001",
        }),
    )
}

pub fn block_metadata_movement(version: u64) -> Value {
    movement(
        version,
        "0",
        json!({
            "__typename": "BlockMetadataTransaction",
            "version": version.to_string(),
            "hash": hash_for(version),
            "epoch": "12",
            "timestamp": "1700000000000002",
        }),
    )
}

pub fn genesis_movement(version: u64) -> Value {
    movement(
        version,
        "0",
        json!({
            "__typename": "GenesisTransaction",
            "version": version.to_string(),
            "hash": hash_for(version),
        }),
    )
}

pub fn unknown_movement(version: u64) -> Value {
    movement(
        version,
        "0",
        json!({
            "__typename": "StateCheckpointTransaction",
            "version": version.to_string(),
            "hash": hash_for(version),
        }),
    )
}
