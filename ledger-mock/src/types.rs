/// Request and response types for the mocked indexer and ledger RPC
///
/// Field names follow the real services so clients parse them unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// GraphQL POST body; only the variables matter to the mock
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: MovementsVariables,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementsVariables {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub first: Option<usize>,
    #[serde(default)]
    pub after: Option<String>,
}

/// Response from GET /v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerInfoResponse {
    pub chain_id: u8,
    pub epoch: String,
    pub ledger_version: String,
    pub ledger_timestamp: String,
    pub node_role: String,
}

/// Response from GET /v1/accounts/{address}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub sequence_number: String,
    pub authentication_key: String,
}

/// Body of POST /v1/view
#[derive(Debug, Clone, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

/// Response from POST /v1/transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransactionResponse {
    pub hash: String,
    pub sender: String,
    pub sequence_number: String,
}

/// Error body in the ledger's format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error_code: String,
}

/// A transaction body received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub content_type: String,
    pub body: Vec<u8>,
    /// Status the mock answered with
    pub status: u16,
}

impl Submission {
    /// Sender bytes of a BCS signed transaction
    pub fn sender_hex(&self) -> Option<String> {
        self.body.get(..32).map(hex::encode)
    }

    pub fn sequence_number(&self) -> Option<u64> {
        let bytes: [u8; 8] = self.body.get(32..40)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }
}

/// Seed data loadable from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub chain_id: Option<u8>,
    #[serde(default)]
    pub accounts: Vec<AccountFixture>,
    /// auth key → originating address
    #[serde(default)]
    pub originating_addresses: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountFixture {
    pub address: String,
    #[serde(default)]
    pub sequence_number: u64,
    #[serde(default)]
    pub resources: Vec<Value>,
    /// Movement nodes as the indexer returns them; absent means the indexer
    /// does not know the account
    #[serde(default)]
    pub movements: Option<Vec<Value>>,
}
