use chrono::Utc;
use std::sync::{Arc, OnceLock};

use super::types::{AccountAddress, ChainId, EntryFunction, RawTransaction, TransactionPayload};
use crate::config::LedgerConfig;
use crate::error::WalletError;
use crate::ledger::RpcClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            max_gas_amount: 2_000_000,
            gas_unit_price: 200,
        }
    }
}

/// Assembles raw entry-function transactions
///
/// The sequence number is read from the ledger on every build. The chain id
/// comes from config, or from the ledger info endpoint once per builder.
pub struct TransactionBuilder {
    rpc: Arc<dyn RpcClient>,
    chain_id: OnceLock<u8>,
    gas_config: GasConfig,
    expiration_secs: u64,
}

impl TransactionBuilder {
    /// `chain_id` of `None` means ask the ledger
    pub fn new(rpc: Arc<dyn RpcClient>, chain_id: Option<u8>) -> Self {
        let cell = OnceLock::new();
        if let Some(id) = chain_id {
            let _ = cell.set(id);
        }
        Self {
            rpc,
            chain_id: cell,
            gas_config: GasConfig::default(),
            expiration_secs: 120,
        }
    }

    pub fn from_config(rpc: Arc<dyn RpcClient>, config: &LedgerConfig) -> Self {
        Self::new(rpc, config.chain_id)
            .with_gas(config.max_gas_amount, config.gas_unit_price)
            .with_expiration(config.transaction_timeout_secs)
    }

    /// Set gas configuration
    pub fn with_gas(mut self, max_gas_amount: u64, gas_unit_price: u64) -> Self {
        self.gas_config = GasConfig {
            max_gas_amount,
            gas_unit_price,
        };
        self
    }

    /// Set expiration time in seconds from now
    pub fn with_expiration(mut self, expiration_secs: u64) -> Self {
        self.expiration_secs = expiration_secs;
        self
    }

    pub fn gas_config(&self) -> GasConfig {
        self.gas_config
    }

    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }

    /// Current on-chain sequence number of `sender`; never cached
    pub async fn fetch_sequence_number(&self, sender: &AccountAddress) -> Result<u64, WalletError> {
        self.rpc.get_sequence_number(sender).await
    }

    pub async fn resolve_chain_id(&self) -> Result<ChainId, WalletError> {
        if let Some(id) = self.chain_id.get() {
            return Ok(ChainId(*id));
        }
        let id = self.rpc.get_chain_id().await?;
        log::info!("Ledger reports chain id {}", id);
        let _ = self.chain_id.set(id);
        Ok(ChainId(id))
    }

    /// Raw transaction with the expiration stamped from the current clock
    pub fn build(
        &self,
        sender: AccountAddress,
        sequence_number: u64,
        chain_id: ChainId,
        function: EntryFunction,
    ) -> RawTransaction {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        RawTransaction {
            sender,
            sequence_number,
            payload: TransactionPayload::EntryFunction(function),
            max_gas_amount: self.gas_config.max_gas_amount,
            gas_unit_price: self.gas_config.gas_unit_price,
            expiration_timestamp_secs: now.saturating_add(self.expiration_secs),
            chain_id,
        }
    }

    /// Fetch the sequence number and chain id, then build
    pub async fn build_entry_function(
        &self,
        sender: AccountAddress,
        function: EntryFunction,
    ) -> Result<RawTransaction, WalletError> {
        let sequence_number = self.fetch_sequence_number(&sender).await?;
        let chain_id = self.resolve_chain_id().await?;
        log::debug!(
            "Building {}::{} for {} at sequence {}",
            function.module,
            function.function,
            sender,
            sequence_number
        );
        Ok(self.build(sender, sequence_number, chain_id, function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::AuthKey;
    use crate::transaction::Identifier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRpc {
        sequence_number: u64,
        chain_id_calls: AtomicUsize,
    }

    #[async_trait]
    impl RpcClient for StubRpc {
        async fn get_account_resources(
            &self,
            _: &AccountAddress,
        ) -> Result<Vec<Result<crate::ledger::AccountResource, WalletError>>, WalletError> {
            Ok(Vec::new())
        }

        async fn get_sequence_number(&self, _: &AccountAddress) -> Result<u64, WalletError> {
            Ok(self.sequence_number)
        }

        async fn get_chain_id(&self) -> Result<u8, WalletError> {
            self.chain_id_calls.fetch_add(1, Ordering::SeqCst);
            Ok(4)
        }

        async fn get_originating_address(&self, auth_key: &AuthKey) -> Result<AccountAddress, WalletError> {
            Ok(auth_key.to_account_address())
        }

        async fn submit_transaction(&self, _: Vec<u8>) -> Result<Option<String>, WalletError> {
            Ok(None)
        }
    }

    fn set_slow() -> EntryFunction {
        EntryFunction::new(
            "0x1::slow_wallet".parse().unwrap(),
            Identifier::new("user_set_slow").unwrap(),
            vec![],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_build_uses_fresh_sequence_and_config() {
        let rpc = Arc::new(StubRpc {
            sequence_number: 7,
            chain_id_calls: AtomicUsize::new(0),
        });
        let builder = TransactionBuilder::new(rpc.clone(), Some(1))
            .with_gas(1_000, 100)
            .with_expiration(60);

        let before = Utc::now().timestamp() as u64;
        let raw = builder
            .build_entry_function(AccountAddress::ONE, set_slow())
            .await
            .unwrap();

        assert_eq!(raw.sequence_number, 7);
        assert_eq!(raw.chain_id, ChainId(1));
        assert_eq!(raw.max_gas_amount, 1_000);
        assert_eq!(raw.gas_unit_price, 100);
        assert!(raw.expiration_timestamp_secs >= before + 60);
        assert!(raw.expiration_timestamp_secs <= before + 62);
        assert_eq!(rpc.chain_id_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_id_discovered_once() {
        let rpc = Arc::new(StubRpc {
            sequence_number: 0,
            chain_id_calls: AtomicUsize::new(0),
        });
        let builder = TransactionBuilder::new(rpc.clone(), None);

        assert_eq!(builder.resolve_chain_id().await.unwrap(), ChainId(4));
        assert_eq!(builder.resolve_chain_id().await.unwrap(), ChainId(4));
        assert_eq!(rpc.chain_id_calls.load(Ordering::SeqCst), 1);
    }
}
