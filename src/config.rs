/// Ledger configuration from environment variables
///
/// Controls the indexer and RPC endpoints, gas parameters and local data dir.
/// Defaults target the public Open Libra mainnet services.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_INDEXER_URL: &str = "https://api.0l.fyi/graphql";
pub const DEFAULT_RPC_URL: &str = "https://rpc.0l.fyi";

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// GraphQL endpoint serving account movement history
    pub indexer_url: String,
    /// Ledger REST RPC base URL (without the `/v1` suffix)
    pub rpc_url: String,
    /// Chain id stamped into raw transactions; `None` means ask the RPC
    pub chain_id: Option<u8>,
    /// Max gas units a transaction may consume
    pub max_gas_amount: u64,
    /// Gas unit price
    pub gas_unit_price: u64,
    /// Seconds from now until a built transaction expires
    pub transaction_timeout_secs: u64,
    /// Movement history page size requested from the indexer
    pub movements_page_size: u32,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    /// Base directory for on-disk storage
    pub data_dir: PathBuf,
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `INDEXER_URL`: GraphQL indexer endpoint
    /// - `RPC_URL`: ledger REST endpoint
    /// - `CHAIN_ID`: numeric chain id, or `auto` to query the RPC
    /// - `MAX_GAS_AMOUNT`, `GAS_UNIT_PRICE`, `TRANSACTION_TIMEOUT_SECS`
    /// - `MOVEMENTS_PAGE_SIZE`, `REQUEST_TIMEOUT_SECS`
    /// - `WALLET_DATA_DIR`: storage directory
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Point at a local ledger-mock
    /// INDEXER_URL=http://localhost:8080/graphql RPC_URL=http://localhost:8080 cargo test
    /// ```
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let indexer_url = env::var("INDEXER_URL").unwrap_or(defaults.indexer_url);
        log::info!("📡 Indexer URL: {}", indexer_url);

        let rpc_url = env::var("RPC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.rpc_url);
        log::info!("🔗 Ledger RPC URL: {}", rpc_url);

        let chain_id = match env::var("CHAIN_ID") {
            Ok(value) if value.eq_ignore_ascii_case("auto") => {
                log::info!("Chain id will be fetched from the ledger");
                None
            }
            Ok(value) => match value.parse::<u8>() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("⚠️  Invalid CHAIN_ID '{}', defaulting to {:?}", value, defaults.chain_id);
                    defaults.chain_id
                }
            },
            Err(_) => defaults.chain_id,
        };

        let data_dir = env::var("WALLET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            indexer_url,
            rpc_url,
            chain_id,
            max_gas_amount: parse_var("MAX_GAS_AMOUNT", defaults.max_gas_amount),
            gas_unit_price: parse_var("GAS_UNIT_PRICE", defaults.gas_unit_price),
            transaction_timeout_secs: parse_var(
                "TRANSACTION_TIMEOUT_SECS",
                defaults.transaction_timeout_secs,
            ),
            movements_page_size: parse_var("MOVEMENTS_PAGE_SIZE", defaults.movements_page_size),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            data_dir,
        }
    }

    /// Config pointing both endpoints at one server (ledger-mock layout)
    pub fn for_local(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            indexer_url: format!("{}/graphql", base),
            rpc_url: base.to_string(),
            ..Default::default()
        }
    }

    pub fn transactions_url(&self) -> String {
        format!("{}/v1/transactions", self.rpc_url)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: Some(1),
            max_gas_amount: 2_000_000,
            gas_unit_price: 200,
            transaction_timeout_secs: 120,
            movements_page_size: 1_000,
            request_timeout_secs: 30,
            data_dir: PathBuf::from("./wallet-data"),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid {} '{}', defaulting to {:?}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}
