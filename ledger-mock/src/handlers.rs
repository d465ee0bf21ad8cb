/// Axum HTTP handlers for the indexer and ledger RPC endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use std::sync::Arc;

use crate::state::{normalize_address, MockLedger, ACCEPTED};
use crate::types::*;

pub const SIGNED_TRANSACTION_CONTENT_TYPE: &str = "application/x.diem.signed_transaction+bcs";
pub const GET_ORIGINATING_ADDRESS: &str = "0x1::account::get_originating_address";
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Shared application state
pub type AppState = Arc<MockLedger>;

/// Custom error type for handlers
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    UnsupportedMediaType(String),
    Rejected(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "account_not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", msg)
            }
            ApiError::Rejected(status, msg) => (status, "vm_error", msg),
        };

        let body = ErrorResponse {
            message,
            error_code: error_code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

// ============================================================================
// Indexer
// ============================================================================

/// POST /graphql
/// Serves the account movements query, paginated by version cursor
pub async fn graphql(
    State(ledger): State<AppState>,
    Json(request): Json<GraphQlRequest>,
) -> Json<Value> {
    ledger.record_graphql_request();
    let variables = request.variables;
    log::debug!(
        "GraphQL {:?} for {} after {:?}",
        request.operation_name,
        variables.address,
        variables.after
    );

    let movements = ledger
        .account(&variables.address)
        .and_then(|account| account.movements);
    let Some(mut nodes) = movements else {
        return Json(json!({ "data": { "account": null } }));
    };

    nodes.sort_by_key(node_version);
    if variables.order.as_deref() != Some("ASC") {
        nodes.reverse();
    }

    let start = match &variables.after {
        Some(cursor) => nodes
            .iter()
            .position(|node| node_version(node).to_string() == *cursor)
            .map(|index| index + 1)
            .unwrap_or(nodes.len()),
        None => 0,
    };
    let first = variables.first.unwrap_or(DEFAULT_PAGE_SIZE);
    let end = start.saturating_add(first).min(nodes.len());
    let has_next_page = end < nodes.len();

    let edges: Vec<Value> = nodes[start.min(end)..end]
        .iter()
        .map(|node| {
            json!({
                "cursor": node_version(node).to_string(),
                "node": node,
            })
        })
        .collect();

    let balance = nodes
        .iter()
        .max_by_key(|node| node_version(node))
        .and_then(|node| node.get("balance").cloned())
        .unwrap_or_else(|| json!("0"));

    Json(json!({
        "data": {
            "account": {
                "balance": balance,
                "movements": {
                    "totalCount": nodes.len(),
                    "pageInfo": {
                        "prevCursor": variables.after,
                        "hasNextPage": has_next_page,
                    },
                    "edges": edges,
                }
            }
        }
    }))
}

fn node_version(node: &Value) -> u64 {
    match &node["version"] {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

// ============================================================================
// Ledger RPC
// ============================================================================

/// GET /v1
pub async fn ledger_info(State(ledger): State<AppState>) -> Json<LedgerInfoResponse> {
    Json(LedgerInfoResponse {
        chain_id: ledger.chain_id(),
        epoch: "1".to_string(),
        ledger_version: "0".to_string(),
        ledger_timestamp: "0".to_string(),
        node_role: "full_node".to_string(),
    })
}

/// GET /v1/accounts/{address}
pub async fn get_account(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ledger
        .account(&address)
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {}", address)))?;
    Ok(Json(AccountResponse {
        sequence_number: account.sequence_number.to_string(),
        authentication_key: format!("0x{}", normalize_address(&address)),
    }))
}

/// GET /v1/accounts/{address}/resources
pub async fn get_account_resources(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let account = ledger
        .account(&address)
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {}", address)))?;
    Ok(Json(account.resources))
}

/// POST /v1/view
/// Only the originating address lookup is supported
pub async fn view(
    State(ledger): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.function != GET_ORIGINATING_ADDRESS {
        return Err(ApiError::BadRequest(format!(
            "Unsupported view function: {}",
            request.function
        )));
    }
    let auth_key = request
        .arguments
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("Missing auth key argument".to_string()))?;

    let found: Vec<String> = ledger
        .originating_address(auth_key)
        .map(|address| format!("0x{}", address))
        .into_iter()
        .collect();
    Ok(Json(json!([{ "vec": found }])))
}

/// POST /v1/transactions
/// Records the body, answers with the configured status and commits on 202
pub async fn submit_transaction(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<PendingTransactionResponse>), ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type != SIGNED_TRANSACTION_CONTENT_TYPE {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Expected {}, got {:?}",
            SIGNED_TRANSACTION_CONTENT_TYPE, content_type
        )));
    }

    let status = ledger.submission_status();
    let submission = Submission {
        content_type,
        body: body.to_vec(),
        status,
    };
    let sender = submission.sender_hex();
    let sequence_number = submission.sequence_number();
    ledger.record_submission(submission);

    let (Some(sender), Some(sequence_number)) = (sender, sequence_number) else {
        return Err(ApiError::BadRequest("Transaction body too short".to_string()));
    };

    if status != ACCEPTED {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        return Err(ApiError::Rejected(
            status,
            format!("Transaction {} #{} rejected", sender, sequence_number),
        ));
    }

    if let Some(account) = ledger.account(&sender) {
        if sequence_number < account.sequence_number {
            return Err(ApiError::BadRequest(format!(
                "SEQUENCE_NUMBER_TOO_OLD: {} < {}",
                sequence_number, account.sequence_number
            )));
        }
    }
    ledger.commit_sequence_number(&sender, sequence_number);

    let hash = format!("0x{}", hex::encode(Sha3_256::digest(&body)));
    log::info!("✅ Accepted transaction {} from 0x{} #{}", hash, sender, sequence_number);

    Ok((
        StatusCode::ACCEPTED,
        Json(PendingTransactionResponse {
            hash,
            sender: format!("0x{}", sender),
            sequence_number: sequence_number.to_string(),
        }),
    ))
}
