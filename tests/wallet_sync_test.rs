//! Ledger sync integration tests
//!
//! Imports wallets against an in-process ledger mock and checks what the
//! sync engine writes to storage: movements, transaction rows by type,
//! balances and slow wallet state, across repeated syncs.
//!
//! Run with: cargo test --test wallet_sync_test -- --nocapture

mod common;

use common::*;
use libra_wallet::storage::LedgerStore;
use libra_wallet::{AccountAddress, WalletError};
use serde_json::json;

// ============================================================================
// Import and first sync
// ============================================================================

#[tokio::test]
async fn test_import_mnemonic_syncs_history() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.add_movement(TEST_AUTH_KEY, user_movement(42, "1000000"));

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();
    log::info!("Imported wallet {}", wallet.address);

    assert_eq!(wallet.address, test_address());
    assert_eq!(wallet.auth_key.to_hex(), TEST_AUTH_KEY);

    let keys = env.manager.get_wallet_keys().await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].public_key.to_hex(), TEST_PUBLIC_KEY);
    assert_eq!(keys[0].auth_key.to_hex(), TEST_AUTH_KEY);

    let movements = env.manager.get_movements(&wallet.address).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].version, 42);
    assert_eq!(movements[0].balance, "1000000");

    let transactions = env.storage.get_user_transactions().await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].version, 42);
    assert_eq!(transactions[0].sender, test_address());
    assert_eq!(transactions[0].module_name, "ol_account");
    assert_eq!(transactions[0].function_name, "transfer");
    assert_eq!(hex::encode(&transactions[0].hash), format!("{:064x}", 42));
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.add_movement(TEST_AUTH_KEY, user_movement(42, "1000000"));
    env.ledger.add_movement(TEST_AUTH_KEY, block_metadata_movement(41));
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        &format!("0x1::coin::CoinStore<{}>", LIBRA_COIN),
        json!({ "coin": { "value": "1000000" } }),
    );
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        "0x1::slow_wallet::SlowWallet",
        json!({ "transferred": "5", "unlocked": "7" }),
    );

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    let movements = env.manager.get_movements(&wallet.address).await.unwrap();
    let user_transactions = env.storage.get_user_transactions().await.unwrap();
    let block_metadata = env.storage.get_block_metadata_transactions().await.unwrap();
    let balances = env.manager.get_wallet_balances(&wallet.address).await.unwrap();
    let slow_wallet = env.manager.get_slow_wallet(&wallet.address).await.unwrap();
    assert_eq!(movements.len(), 2);
    assert_eq!(balances.len(), 1);
    assert!(slow_wallet.is_some());

    let report = env.manager.sync_wallet(&wallet.address).await.unwrap();
    assert!(report.account_found);
    assert_eq!(report.movements, 2);
    assert_eq!(report.transactions_inserted, 0, "rows already stored on import");

    assert_eq!(env.manager.get_movements(&wallet.address).await.unwrap(), movements);
    assert_eq!(env.storage.get_user_transactions().await.unwrap(), user_transactions);
    assert_eq!(env.storage.get_block_metadata_transactions().await.unwrap(), block_metadata);
    assert_eq!(env.manager.get_wallet_balances(&wallet.address).await.unwrap(), balances);
    assert_eq!(env.manager.get_slow_wallet(&wallet.address).await.unwrap(), slow_wallet);
}

#[tokio::test]
async fn test_import_twice_keeps_one_wallet() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.index_account(TEST_AUTH_KEY);

    let first = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();
    let second = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    assert_eq!(first.address, second.address);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(env.manager.get_wallets().await.unwrap().len(), 1);
    assert_eq!(env.manager.get_wallet_keys().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_resolves_rotated_address() {
    let env = TestEnvironment::new().await.unwrap();
    let rotated = "0x0000000000000000000000000000000000000000000000000000000000c0ffee";
    env.ledger.set_originating_address(TEST_AUTH_KEY, rotated);
    env.ledger.add_movement(rotated, user_movement(7, "55"));

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    assert_eq!(wallet.address, AccountAddress::from_hex(rotated).unwrap());
    assert_eq!(wallet.auth_key.to_hex(), TEST_AUTH_KEY);
    assert_eq!(env.manager.get_movements(&wallet.address).await.unwrap().len(), 1);

    let by_auth = env
        .manager
        .get_wallets_from_auth_key(&wallet.auth_key)
        .await
        .unwrap();
    assert_eq!(by_auth.len(), 1);
    assert_eq!(by_auth[0].address, wallet.address);
}

// ============================================================================
// Movement classification
// ============================================================================

#[tokio::test]
async fn test_transactions_are_stored_by_type() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.add_movement(TEST_AUTH_KEY, genesis_movement(0));
    env.ledger.add_movement(TEST_AUTH_KEY, block_metadata_movement(10));
    env.ledger.add_movement(TEST_AUTH_KEY, script_movement(20));
    env.ledger.add_movement(TEST_AUTH_KEY, user_movement(30, "900"));
    env.ledger.add_movement(TEST_AUTH_KEY, unknown_movement(40));

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    let movements = env.manager.get_movements(&wallet.address).await.unwrap();
    let versions: Vec<u64> = movements.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![40, 30, 20, 10, 0], "newest first, unknown type kept");

    assert_eq!(env.storage.get_genesis_transactions().await.unwrap().len(), 1);
    assert_eq!(env.storage.get_user_transactions().await.unwrap().len(), 1);

    let block = env.storage.get_block_metadata_transactions().await.unwrap();
    assert_eq!(block.len(), 1);
    assert_eq!(block[0].epoch, 12);

    let script = env.storage.get_script_user_transactions().await.unwrap();
    assert_eq!(script.len(), 1);
    assert!(!script[0].success);
    assert_eq!(script[0].sender, test_address());
}

#[tokio::test]
async fn test_malformed_edge_is_skipped() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.add_movement(TEST_AUTH_KEY, user_movement(5, "10"));

    let mut bad = user_movement(6, "10");
    bad["transaction"]["hash"] = json!("0xnot-hex");
    env.ledger.add_movement(TEST_AUTH_KEY, bad);

    let mut negative = user_movement(7, "10");
    negative["balance"] = json!("-3");
    env.ledger.add_movement(TEST_AUTH_KEY, negative);

    env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();
    let report = env.manager.sync_wallet(&test_address()).await.unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.movements, 1);
    let movements = env.manager.get_movements(&test_address()).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].version, 5);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_history_is_paged_to_the_end() {
    let env = TestEnvironment::with_config(|config| config.movements_page_size = 2)
        .await
        .unwrap();
    for version in 1..=5 {
        env.ledger
            .add_movement(TEST_AUTH_KEY, user_movement(version, &(version * 100).to_string()));
    }

    env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();
    let requests_after_import = env.ledger.graphql_requests();
    assert_eq!(requests_after_import, 3);

    let report = env.manager.sync_wallet(&test_address()).await.unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.movements, 5);
    assert_eq!(env.ledger.graphql_requests(), requests_after_import + 3);

    let movements = env.manager.get_movements(&test_address()).await.unwrap();
    assert_eq!(movements.len(), 5);
    assert_eq!(movements[0].version, 5);
    assert_eq!(movements[0].balance, "500");
    assert_eq!(env.storage.get_user_transactions().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_unknown_account_syncs_nothing() {
    let env = TestEnvironment::new().await.unwrap();

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();
    let report = env.manager.sync_wallet(&wallet.address).await.unwrap();

    assert!(!report.account_found);
    assert_eq!(report.pages, 0);
    assert_eq!(report.movements, 0);
    assert!(env.manager.get_movements(&wallet.address).await.unwrap().is_empty());
    assert!(env.manager.get_wallet_balances(&wallet.address).await.unwrap().is_empty());
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn test_resources_update_balances_and_slow_wallet() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.index_account(TEST_AUTH_KEY);
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        &format!("0x1::coin::CoinStore<{}>", LIBRA_COIN),
        json!({ "coin": { "value": "123456789" }, "frozen": false }),
    );
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        "0x1::slow_wallet::SlowWallet",
        json!({ "transferred": "10", "unlocked": "20" }),
    );
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        "0x1::account::Account",
        json!({ "sequence_number": "0" }),
    );
    env.ledger.add_resource(
        TEST_AUTH_KEY,
        "0x1::coin::CoinStore<0x1::fake::Fake>",
        json!({ "coin": { "value": "lots" } }),
    );
    env.ledger.add_raw_resource(TEST_AUTH_KEY, json!("not a resource"));

    let wallet = env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    let report = env.manager.sync_wallet(&wallet.address).await.unwrap();
    assert_eq!(report.balances, 1);
    assert_eq!(report.slow_wallets, 1);
    assert_eq!(report.skipped, 2);

    let report = env.manager.sync_wallet(&wallet.address).await.unwrap();
    assert_eq!(report.balances, 1);

    let balances = env.manager.get_wallet_balances(&wallet.address).await.unwrap();
    assert_eq!(balances.len(), 1, "re-sync must not duplicate balance rows");
    assert_eq!(balances[0].coin.type_tag, LIBRA_COIN);
    assert_eq!(balances[0].amount, "123456789");

    let slow = env.manager.get_slow_wallet(&wallet.address).await.unwrap().unwrap();
    assert_eq!(slow.transferred, "10");
    assert_eq!(slow.unlocked, "20");
}

// ============================================================================
// Failures and persistence
// ============================================================================

#[tokio::test]
async fn test_unreachable_ledger_is_transport_failure() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.index_account(TEST_AUTH_KEY);
    env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    let mut config = env.config.clone();
    let url = unreachable_url().await;
    config.indexer_url = format!("{}/graphql", url);
    config.rpc_url = url;
    let offline = build_manager(&config, env.storage.clone(), env.secure_store.clone()).unwrap();

    let result = offline.sync_wallet(&test_address()).await;
    match result {
        Err(e @ WalletError::TransportFailure(_)) => assert!(e.is_retryable()),
        other => panic!("expected transport failure, got {:?}", other),
    }

    // Local state survives the failed sync
    assert_eq!(offline.get_wallets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_synced_state_survives_reopen() {
    let env = TestEnvironment::new().await.unwrap();
    env.ledger.add_movement(TEST_AUTH_KEY, user_movement(42, "1000000"));
    env.manager.import_mnemonic(TEST_MNEMONIC).await.unwrap();

    let reopened = env.reopen().unwrap();
    let wallets = reopened.get_wallets().await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].address, test_address());
    assert_eq!(reopened.get_movements(&test_address()).await.unwrap().len(), 1);
    assert_eq!(
        reopened.storage().get_user_transactions().await.unwrap()[0].version,
        42
    );
}
