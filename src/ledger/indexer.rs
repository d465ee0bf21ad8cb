//! Movement history from the GraphQL indexer
//!
//! Edges are decoded one at a time so that a single bad edge is reported
//! on its own instead of failing the page.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::LedgerConfig;
use crate::error::WalletError;
use crate::transaction::AccountAddress;

pub const GET_MOVEMENTS: &str = r#"
  query GetAccountMovements(
    $address: Bytes!,
    $order: OrderDirection,
    $first: Int,
    $after: String,
  ) {
    account(address: $address) {
      balance
      movements(
        order: $order,
        after: $after,
        first: $first,
      ) {
        totalCount
        pageInfo {
          prevCursor
          hasNextPage
        }
        edges {
          cursor
          node {
            amount
            unlockedAmount
            lockedAmount
            balance
            lockedBalance
            version
            transaction {
              __typename
              version
              hash
              ... on BlockMetadataTransaction {
                epoch
                timestamp
              }
              ... on UserTransaction {
                success
                moduleName
                moduleAddress
                functionName
                sender
                arguments
                timestamp
              }
              ... on ScriptUserTransaction {
                success
                timestamp
                sender
              }
            }
          }
        }
      }
    }
  }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    Asc,
    Desc,
}

/// One page of movements; `edges` keeps per-edge decode failures
#[derive(Debug)]
pub struct MovementsPage {
    pub total_count: Option<u64>,
    pub prev_cursor: Option<String>,
    pub has_next_page: bool,
    /// Cursor of the last edge, readable even when that edge failed to decode
    pub end_cursor: Option<String>,
    pub edges: Vec<Result<MovementEdge, WalletError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovementEdge {
    pub cursor: String,
    pub node: MovementNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementNode {
    #[serde(default, deserialize_with = "amount_string")]
    pub amount: String,
    #[serde(deserialize_with = "amount_string")]
    pub unlocked_amount: String,
    #[serde(deserialize_with = "amount_string")]
    pub locked_amount: String,
    #[serde(deserialize_with = "amount_string")]
    pub balance: String,
    #[serde(deserialize_with = "amount_string")]
    pub locked_balance: String,
    #[serde(deserialize_with = "u64_from_any")]
    pub version: u64,
    pub transaction: IndexedTransaction,
}

/// Transaction embedded in a movement, discriminated by `__typename`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "__typename")]
pub enum IndexedTransaction {
    #[serde(rename_all = "camelCase")]
    UserTransaction {
        #[serde(deserialize_with = "u64_from_any")]
        version: u64,
        hash: String,
        sender: String,
        module_address: String,
        module_name: String,
        function_name: String,
        #[serde(default, deserialize_with = "arguments_string")]
        arguments: String,
        success: bool,
        #[serde(deserialize_with = "u64_from_any")]
        timestamp: u64,
    },
    ScriptUserTransaction {
        #[serde(deserialize_with = "u64_from_any")]
        version: u64,
        hash: String,
        sender: String,
        success: bool,
        #[serde(deserialize_with = "u64_from_any")]
        timestamp: u64,
    },
    BlockMetadataTransaction {
        #[serde(deserialize_with = "u64_from_any")]
        version: u64,
        hash: String,
        #[serde(deserialize_with = "u64_from_any")]
        epoch: u64,
        #[serde(deserialize_with = "u64_from_any")]
        timestamp: u64,
    },
    GenesisTransaction {
        #[serde(deserialize_with = "u64_from_any")]
        version: u64,
        hash: String,
    },
    #[serde(other)]
    Unknown,
}

#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// `Ok(None)` when the indexer has no account for `address`
    async fn get_account_movements(
        &self,
        address: &AccountAddress,
        order: Order,
        first: u32,
        after: Option<&str>,
    ) -> Result<Option<MovementsPage>, WalletError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLRequest<'a> {
    operation_name: &'a str,
    query: &'a str,
    variables: MovementsVariables<'a>,
}

#[derive(Serialize)]
struct MovementsVariables<'a> {
    address: String,
    order: Order,
    first: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMovements {
    total_count: Option<Value>,
    page_info: Option<RawPageInfo>,
    #[serde(default)]
    edges: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    prev_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// Indexer reached over HTTP
#[derive(Clone)]
pub struct GraphQlIndexer {
    client: Client,
    url: String,
}

impl GraphQlIndexer {
    pub fn new(config: &LedgerConfig) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.indexer_url))
    }

    pub fn with_client(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl IndexerClient for GraphQlIndexer {
    async fn get_account_movements(
        &self,
        address: &AccountAddress,
        order: Order,
        first: u32,
        after: Option<&str>,
    ) -> Result<Option<MovementsPage>, WalletError> {
        let request = GraphQLRequest {
            operation_name: "GetAccountMovements",
            query: GET_MOVEMENTS,
            variables: MovementsVariables {
                address: address.to_hex(),
                order,
                first,
                after,
            },
        };

        log::debug!("Querying movements for {} (after {:?})", address, after);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::TransportFailure(format!("GraphQL request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::TransportFailure(format!(
                "indexer returned {}: {}",
                status, body
            )));
        }

        let result: GraphQLResponse = response.json().await.map_err(|e| {
            WalletError::TransportFailure(format!("Failed to parse GraphQL response: {}", e))
        })?;

        parse_movements_response(result)
    }
}

fn parse_movements_response(result: GraphQLResponse) -> Result<Option<MovementsPage>, WalletError> {
    if let Some(errors) = result.errors.filter(|errors| !errors.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(WalletError::TransportFailure(format!(
            "GraphQL errors: {}",
            messages.join("; ")
        )));
    }

    let data = result
        .data
        .ok_or_else(|| WalletError::TransportFailure("No data in GraphQL response".to_string()))?;

    let account = &data["account"];
    if account.is_null() {
        return Ok(None);
    }

    let raw: RawMovements = serde_json::from_value(account["movements"].clone()).map_err(|e| {
        WalletError::TransportFailure(format!("Unexpected movements shape: {}", e))
    })?;

    let end_cursor = raw
        .edges
        .last()
        .and_then(|edge| edge["cursor"].as_str())
        .map(str::to_string);

    let edges = raw
        .edges
        .into_iter()
        .map(|edge| {
            serde_json::from_value::<MovementEdge>(edge)
                .map_err(|e| WalletError::MalformedMovement(e.to_string()))
        })
        .collect();

    let page_info = raw.page_info.unwrap_or(RawPageInfo {
        prev_cursor: None,
        has_next_page: false,
    });

    Ok(Some(MovementsPage {
        total_count: raw.total_count.as_ref().and_then(value_as_u64),
        prev_cursor: page_info.prev_cursor,
        has_next_page: page_info.has_next_page,
        end_cursor,
        edges,
    }))
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// The indexer sends 64-bit integers either as JSON numbers or as strings
fn u64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_as_u64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {}", value)))
}

fn amount_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_u64() => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected amount, got {}", other))),
    }
}

fn arguments_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}
