/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::state::MockLedger;

pub fn create_router(ledger: Arc<MockLedger>) -> Router {
    // Configure CORS to allow requests from wallet frontend/tests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Indexer
        .route("/graphql", post(graphql))

        // Ledger RPC
        .route("/v1", get(ledger_info))
        .route("/v1/accounts/:address", get(get_account))
        .route("/v1/accounts/:address/resources", get(get_account_resources))
        .route("/v1/view", post(view))
        .route("/v1/transactions", post(submit_transaction))

        // Shared state
        .with_state(ledger)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(ledger: Arc<MockLedger>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(ledger);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Ledger mock server listening on http://{}", addr);
    log::info!("📡 Indexer at http://{}/graphql", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve on an ephemeral localhost port in the background
pub async fn spawn_server(ledger: Arc<MockLedger>) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(ledger);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Ledger mock server stopped: {}", e);
        }
    });

    log::debug!("Ledger mock server spawned on {}", addr);
    Ok(addr)
}
