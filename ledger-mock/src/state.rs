/// In-memory ledger backing the mock endpoints
///
/// Accounts are keyed by their 64-char lowercase hex address without `0x`.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::types::{AccountFixture, Fixtures, Submission};

pub const DEFAULT_CHAIN_ID: u8 = 1;
pub const ACCEPTED: u16 = 202;

#[derive(Debug, Clone, Default)]
pub struct MockAccount {
    pub sequence_number: u64,
    pub resources: Vec<Value>,
    pub movements: Option<Vec<Value>>,
}

#[derive(Debug)]
struct LedgerData {
    chain_id: u8,
    accounts: HashMap<String, MockAccount>,
    originating_addresses: HashMap<String, String>,
    submission_status: u16,
    submissions: Vec<Submission>,
    graphql_requests: usize,
}

#[derive(Debug)]
pub struct MockLedger {
    data: RwLock<LedgerData>,
}

/// Strip `0x`, lowercase and left-pad to 32 bytes
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_lowercase();
    format!("{:0>64}", hex)
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(LedgerData {
                chain_id: DEFAULT_CHAIN_ID,
                accounts: HashMap::new(),
                originating_addresses: HashMap::new(),
                submission_status: ACCEPTED,
                submissions: Vec::new(),
                graphql_requests: 0,
            }),
        }
    }

    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        let ledger = Self::new();
        if let Some(chain_id) = fixtures.chain_id {
            ledger.set_chain_id(chain_id);
        }
        for AccountFixture {
            address,
            sequence_number,
            resources,
            movements,
        } in fixtures.accounts
        {
            ledger.write().accounts.insert(
                normalize_address(&address),
                MockAccount {
                    sequence_number,
                    resources,
                    movements,
                },
            );
        }
        for (auth_key, address) in fixtures.originating_addresses {
            ledger.set_originating_address(&auth_key, &address);
        }
        ledger
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerData> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerData> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================================================
    // Seeding
    // ============================================================================

    pub fn set_chain_id(&self, chain_id: u8) {
        self.write().chain_id = chain_id;
    }

    /// Create the account on chain if needed and set its sequence number
    pub fn set_sequence_number(&self, address: &str, sequence_number: u64) {
        self.write()
            .accounts
            .entry(normalize_address(address))
            .or_default()
            .sequence_number = sequence_number;
    }

    pub fn add_resource(&self, address: &str, resource_type: &str, data: Value) {
        self.write()
            .accounts
            .entry(normalize_address(address))
            .or_default()
            .resources
            .push(serde_json::json!({ "type": resource_type, "data": data }));
    }

    /// Push a raw resource entry, malformed ones included
    pub fn add_raw_resource(&self, address: &str, resource: Value) {
        self.write()
            .accounts
            .entry(normalize_address(address))
            .or_default()
            .resources
            .push(resource);
    }

    /// Add an indexer movement node; makes the account known to the indexer
    pub fn add_movement(&self, address: &str, node: Value) {
        self.write()
            .accounts
            .entry(normalize_address(address))
            .or_default()
            .movements
            .get_or_insert_with(Vec::new)
            .push(node);
    }

    /// Account known to the indexer with no history
    pub fn index_account(&self, address: &str) {
        self.write()
            .accounts
            .entry(normalize_address(address))
            .or_default()
            .movements
            .get_or_insert_with(Vec::new);
    }

    pub fn set_originating_address(&self, auth_key: &str, address: &str) {
        self.write()
            .originating_addresses
            .insert(normalize_address(auth_key), normalize_address(address));
    }

    /// Status returned for every following submission
    pub fn set_submission_status(&self, status: u16) {
        self.write().submission_status = status;
    }

    // ============================================================================
    // Reads
    // ============================================================================

    pub fn chain_id(&self) -> u8 {
        self.read().chain_id
    }

    pub fn account(&self, address: &str) -> Option<MockAccount> {
        self.read().accounts.get(&normalize_address(address)).cloned()
    }

    pub fn originating_address(&self, auth_key: &str) -> Option<String> {
        self.read()
            .originating_addresses
            .get(&normalize_address(auth_key))
            .cloned()
    }

    pub fn submission_status(&self) -> u16 {
        self.read().submission_status
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.read().submissions.clone()
    }

    pub fn graphql_requests(&self) -> usize {
        self.read().graphql_requests
    }

    // ============================================================================
    // Handler hooks
    // ============================================================================

    pub(crate) fn record_graphql_request(&self) {
        self.write().graphql_requests += 1;
    }

    pub(crate) fn record_submission(&self, submission: Submission) {
        self.write().submissions.push(submission);
    }

    /// Commit an accepted transaction; the next sequence number becomes `sequence_number + 1`
    pub(crate) fn commit_sequence_number(&self, address: &str, sequence_number: u64) {
        let mut data = self.write();
        let account = data.accounts.entry(normalize_address(address)).or_default();
        account.sequence_number = account.sequence_number.max(sequence_number + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("0x1"), format!("{}1", "0".repeat(63)));
        assert_eq!(normalize_address(&"AB".repeat(32)), "ab".repeat(32));
    }

    #[test]
    fn test_commit_never_moves_backwards() {
        let ledger = MockLedger::new();
        ledger.set_sequence_number("0x1", 9);
        ledger.commit_sequence_number("0x1", 3);
        assert_eq!(ledger.account("0x1").unwrap().sequence_number, 9);
        ledger.commit_sequence_number("0x1", 9);
        assert_eq!(ledger.account("0x1").unwrap().sequence_number, 10);
    }

    #[test]
    fn test_resources_alone_do_not_index_account() {
        let ledger = MockLedger::new();
        ledger.add_resource("0x2", "0x1::slow_wallet::SlowWallet", serde_json::json!({}));
        assert!(ledger.account("0x2").unwrap().movements.is_none());
        ledger.index_account("0x2");
        assert_eq!(ledger.account("0x2").unwrap().movements, Some(vec![]));
    }
}
