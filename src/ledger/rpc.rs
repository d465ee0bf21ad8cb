//! Ledger REST RPC: resources, account state, view calls and submission

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LedgerConfig;
use crate::error::WalletError;
use crate::keys::AuthKey;
use crate::storage::models::validate_amount;
use crate::transaction::AccountAddress;

pub const SIGNED_TRANSACTION_CONTENT_TYPE: &str = "application/x.diem.signed_transaction+bcs";

const COIN_STORE_PREFIX: &str = "0x1::coin::CoinStore<";
const COIN_STORE_SUFFIX: &str = ">";
const SLOW_WALLET_TYPE: &str = "0x1::slow_wallet::SlowWallet";
const ORIGINATING_ADDRESS_FUNCTION: &str = "0x1::account::get_originating_address";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub data: Value,
}

/// The resource types this wallet understands, decided from the type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    CoinStore { coin_type: String, value: String },
    SlowWallet { transferred: String, unlocked: String },
    Other,
}

impl AccountResource {
    pub fn classify(&self) -> Result<ResourceKind, WalletError> {
        if let Some(coin_type) = coin_store_type(&self.resource_type) {
            let value = field_amount(&self.resource_type, &self.data["coin"]["value"], "coin.value")?;
            return Ok(ResourceKind::CoinStore {
                coin_type: coin_type.to_string(),
                value,
            });
        }

        if self.resource_type == SLOW_WALLET_TYPE {
            return Ok(ResourceKind::SlowWallet {
                transferred: field_amount(&self.resource_type, &self.data["transferred"], "transferred")?,
                unlocked: field_amount(&self.resource_type, &self.data["unlocked"], "unlocked")?,
            });
        }

        Ok(ResourceKind::Other)
    }
}

/// `0x1::coin::CoinStore<T>` → `T`
pub fn coin_store_type(resource_type: &str) -> Option<&str> {
    resource_type
        .strip_prefix(COIN_STORE_PREFIX)?
        .strip_suffix(COIN_STORE_SUFFIX)
        .filter(|inner| !inner.is_empty())
}

fn field_amount(resource_type: &str, value: &Value, field: &str) -> Result<String, WalletError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_u64() => n.to_string(),
        Value::Null => {
            return Err(WalletError::malformed_resource(
                resource_type,
                format!("missing {}", field),
            ))
        }
        other => {
            return Err(WalletError::malformed_resource(
                resource_type,
                format!("{} has unexpected value {}", field, other),
            ))
        }
    };
    validate_amount(field, &raw)
        .map_err(|e| WalletError::malformed_resource(resource_type, e.to_string()))
}

#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Every resource under `address`; entries that are not `{type, data}`
    /// objects come back as `MalformedResource` errors in place
    async fn get_account_resources(
        &self,
        address: &AccountAddress,
    ) -> Result<Vec<Result<AccountResource, WalletError>>, WalletError>;

    async fn get_sequence_number(&self, address: &AccountAddress) -> Result<u64, WalletError>;

    async fn get_chain_id(&self) -> Result<u8, WalletError>;

    /// Account an auth key was first used for, or the auth key itself when
    /// the ledger has no rotation record
    async fn get_originating_address(&self, auth_key: &AuthKey)
        -> Result<AccountAddress, WalletError>;

    /// Submit a BCS-encoded signed transaction; returns the hash when reported
    async fn submit_transaction(&self, signed_txn: Vec<u8>) -> Result<Option<String>, WalletError>;
}

#[derive(Deserialize)]
struct AccountData {
    sequence_number: String,
}

#[derive(Deserialize)]
struct LedgerInfo {
    chain_id: u8,
}

#[derive(Deserialize)]
struct PendingTransaction {
    hash: Option<String>,
}

/// Ledger REST API client
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &LedgerConfig) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.rpc_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<(StatusCode, Value), WalletError> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok((status, Value::Null));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::TransportFailure(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }
        let value = response
            .json()
            .await
            .map_err(|e| WalletError::TransportFailure(format!("invalid JSON from {}: {}", url, e)))?;
        Ok((status, value))
    }
}

#[async_trait]
impl RpcClient for RestClient {
    async fn get_account_resources(
        &self,
        address: &AccountAddress,
    ) -> Result<Vec<Result<AccountResource, WalletError>>, WalletError> {
        let (status, value) = self
            .get_json(&format!("/accounts/{}/resources", address.to_hex_literal()))
            .await?;
        if status == StatusCode::NOT_FOUND {
            log::debug!("No resources for {} yet", address);
            return Ok(Vec::new());
        }

        let Value::Array(items) = value else {
            return Err(WalletError::TransportFailure(format!(
                "resources for {} are not a list",
                address
            )));
        };

        Ok(items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<AccountResource>(item)
                    .map_err(|e| WalletError::malformed_resource("<unknown>", e.to_string()))
            })
            .collect())
    }

    async fn get_sequence_number(&self, address: &AccountAddress) -> Result<u64, WalletError> {
        let (status, value) = self
            .get_json(&format!("/accounts/{}", address.to_hex_literal()))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(WalletError::AccountNotFound(address.to_hex_literal()));
        }
        let account: AccountData = serde_json::from_value(value)
            .map_err(|e| WalletError::TransportFailure(format!("invalid account data: {}", e)))?;
        account.sequence_number.parse().map_err(|_| {
            WalletError::TransportFailure(format!(
                "invalid sequence number {:?}",
                account.sequence_number
            ))
        })
    }

    async fn get_chain_id(&self) -> Result<u8, WalletError> {
        let (status, value) = self.get_json("").await?;
        if status == StatusCode::NOT_FOUND {
            return Err(WalletError::TransportFailure("ledger info endpoint not found".into()));
        }
        let info: LedgerInfo = serde_json::from_value(value)
            .map_err(|e| WalletError::TransportFailure(format!("invalid ledger info: {}", e)))?;
        Ok(info.chain_id)
    }

    async fn get_originating_address(
        &self,
        auth_key: &AuthKey,
    ) -> Result<AccountAddress, WalletError> {
        let fallback = auth_key.to_account_address();
        let response = self
            .client
            .post(self.url("/view"))
            .json(&json!({
                "function": ORIGINATING_ADDRESS_FUNCTION,
                "type_arguments": [],
                "arguments": [format!("0x{}", auth_key.to_hex())],
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "⚠️  Originating address lookup rejected ({}), using auth key: {}",
                status,
                body
            );
            return Ok(fallback);
        }
        if !status.is_success() {
            return Err(WalletError::TransportFailure(format!(
                "view call returned {}",
                status
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| WalletError::TransportFailure(format!("invalid view response: {}", e)))?;
        parse_originating_address(&value).map(|found| found.unwrap_or(fallback))
    }

    async fn submit_transaction(&self, signed_txn: Vec<u8>) -> Result<Option<String>, WalletError> {
        let url = self.url("/transactions");
        log::debug!("Submitting {} byte transaction to {}", signed_txn.len(), url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, SIGNED_TRANSACTION_CONTENT_TYPE)
            .body(signed_txn)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::ACCEPTED {
            log::error!("❌ Transaction rejected with {}: {}", status, body);
            return Err(WalletError::SubmissionRejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let hash = serde_json::from_str::<PendingTransaction>(&body)
            .ok()
            .and_then(|pending| pending.hash);
        log::info!("✅ Transaction accepted: {}", hash.as_deref().unwrap_or("<no hash>"));
        Ok(hash)
    }
}

/// `["0x.."]`, `[{"vec": ["0x.."]}]` or `[{"vec": []}]`
fn parse_originating_address(value: &Value) -> Result<Option<AccountAddress>, WalletError> {
    let first = match value.as_array().and_then(|items| items.first()) {
        Some(first) => first,
        None => return Ok(None),
    };
    let address = match first {
        Value::String(s) => Some(s.as_str()),
        Value::Object(option) => option
            .get("vec")
            .and_then(Value::as_array)
            .and_then(|vec| vec.first())
            .and_then(Value::as_str),
        _ => None,
    };
    address
        .map(AccountAddress::from_hex)
        .transpose()
        .map_err(|e| WalletError::TransportFailure(format!("invalid originating address: {}", e)))
}
