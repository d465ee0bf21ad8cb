/// Ledger Mock Server
///
/// Serves the indexer GraphQL endpoint and the ledger REST API from an
/// in-memory ledger, optionally seeded from a JSON fixtures file.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledger_mock::{run_server, Fixtures, MockLedger};

#[derive(Debug)]
struct Config {
    // Seed data
    fixtures_path: Option<PathBuf>,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let fixtures_path = env::var("LEDGER_MOCK_FIXTURES").ok().map(PathBuf::from);

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            fixtures_path,
            server_host,
            server_port,
        })
    }
}

fn load_fixtures(path: &Path) -> Result<Fixtures> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures {:?}", path))?;
    serde_json::from_str(&content).context("Invalid fixtures JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting Ledger Mock Server...");

    // Load configuration
    let config = Config::from_env()
        .context("Failed to load configuration")?;

    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let ledger = match &config.fixtures_path {
        Some(path) => {
            log::info!("Seeding ledger from {:?}", path);
            MockLedger::from_fixtures(load_fixtures(path)?)
        }
        None => MockLedger::new(),
    };

    // Run server
    run_server(Arc::new(ledger), config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
