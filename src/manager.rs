/// Wallet Manager - Orchestration Layer
///
/// Wires keychain, storage, sync engine and transaction pipeline together and
/// exposes the operations a wallet front end needs.

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::error::WalletError;
use crate::keys::{AuthKey, FileSecureStore, Keychain, PrivateKey, SecureKeyStore};
use crate::ledger::{GraphQlIndexer, IndexerClient, RestClient, RpcClient};
use crate::storage::{
    KeyRepository, LedgerStore, Movement, SlowWallet, Storage, Wallet, WalletBalance, WalletKey,
    WalletRepository,
};
use crate::sync::{LedgerSyncEngine, SubscriptionId, SyncReport, WalletEvent, WalletEventKind};
use crate::transaction::{
    AccountAddress, Signer, SubmittedTransaction, Submitter, TransactionBuilder,
    TransactionManager, TypeTag,
};

const SLOW_WALLET_MODULE: &str = "0x1::slow_wallet";
const SET_SLOW_FUNCTION: &str = "user_set_slow";

pub struct WalletManager {
    pub config: LedgerConfig,
    storage: Arc<Storage>,
    keychain: Arc<Keychain>,
    rpc: Arc<dyn RpcClient>,
    sync: LedgerSyncEngine,
    transactions: TransactionManager,
}

impl WalletManager {
    // ============================================================================
    // Constructors
    // ============================================================================

    /// On-disk storage and secure store under `config.data_dir`, live HTTP clients
    pub fn new(config: LedgerConfig) -> Result<Self, WalletError> {
        let storage = Arc::new(Storage::new_with_base_dir(config.data_dir.join("db"))?);
        let secure_store = Arc::new(FileSecureStore::new(config.data_dir.join("secure")));
        let indexer = Arc::new(GraphQlIndexer::new(&config)?);
        let rpc = Arc::new(RestClient::new(&config)?);

        log::info!("📂 Wallet data directory: {:?}", config.data_dir);
        Ok(Self::with_components(config, storage, secure_store, indexer, rpc))
    }

    pub fn from_env() -> Result<Self, WalletError> {
        Self::new(LedgerConfig::from_env())
    }

    /// Create WalletManager from explicit parts (for testing)
    pub fn with_components(
        config: LedgerConfig,
        storage: Arc<Storage>,
        secure_store: Arc<dyn SecureKeyStore>,
        indexer: Arc<dyn IndexerClient>,
        rpc: Arc<dyn RpcClient>,
    ) -> Self {
        let keychain = Arc::new(Keychain::new(storage.clone(), secure_store));

        let sync = LedgerSyncEngine::new(
            indexer,
            rpc.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
        )
        .with_page_size(config.movements_page_size);

        let transactions = TransactionManager::new(
            TransactionBuilder::from_config(rpc.clone(), &config),
            Signer::new(storage.clone(), keychain.clone()),
            Submitter::new(rpc.clone()),
        );

        Self {
            config,
            storage,
            keychain,
            rpc,
            sync,
            transactions,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn keychain(&self) -> &Arc<Keychain> {
        &self.keychain
    }

    // ============================================================================
    // Import
    // ============================================================================

    pub async fn import_mnemonic(&self, mnemonic: &str) -> Result<Wallet, WalletError> {
        let key = self.keychain.new_key_from_mnemonic(mnemonic).await?;
        self.new_wallet_from_auth_key(key.auth_key).await
    }

    pub async fn import_private_key(&self, private_key: &PrivateKey) -> Result<Wallet, WalletError> {
        let key = self.keychain.new_key_from_private_key(private_key).await?;
        self.new_wallet_from_auth_key(key.auth_key).await
    }

    /// Resolve the account, save it, sync it, then announce it
    async fn new_wallet_from_auth_key(&self, auth_key: AuthKey) -> Result<Wallet, WalletError> {
        let address = self.rpc.get_originating_address(&auth_key).await?;
        let wallet = self.storage.save_wallet(address, auth_key).await?;
        log::info!("👛 Wallet {} saved for auth key {}", address, auth_key);

        self.sync.sync_wallet(&wallet.address).await?;
        self.sync.events().emit(&WalletEvent::NewWallet(wallet.clone()));
        Ok(wallet)
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn get_wallets(&self) -> Result<Vec<Wallet>, WalletError> {
        self.storage.get_wallets().await
    }

    pub async fn get_wallet(&self, address: &AccountAddress) -> Result<Option<Wallet>, WalletError> {
        self.storage.get_wallet(address).await
    }

    pub async fn get_wallets_from_auth_key(
        &self,
        auth_key: &AuthKey,
    ) -> Result<Vec<Wallet>, WalletError> {
        self.storage.get_wallets_from_auth_key(auth_key).await
    }

    pub async fn get_wallet_keys(&self) -> Result<Vec<WalletKey>, WalletError> {
        self.storage.get_wallet_keys().await
    }

    pub async fn get_wallet_balances(
        &self,
        address: &AccountAddress,
    ) -> Result<Vec<WalletBalance>, WalletError> {
        self.storage.get_balances(address).await
    }

    pub async fn get_slow_wallet(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<SlowWallet>, WalletError> {
        self.storage.get_slow_wallet(address).await
    }

    pub async fn get_movements(&self, address: &AccountAddress) -> Result<Vec<Movement>, WalletError> {
        self.storage.get_movements(address).await
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    pub async fn sync_wallet(&self, address: &AccountAddress) -> Result<SyncReport, WalletError> {
        self.sync.sync_wallet(address).await
    }

    pub async fn set_wallet_label(
        &self,
        address: &AccountAddress,
        label: &str,
    ) -> Result<Wallet, WalletError> {
        if !self.storage.set_wallet_label(address, label).await? {
            return Err(WalletError::WalletNotFound(address.to_hex_literal()));
        }
        let wallet = self
            .storage
            .get_wallet(address)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(address.to_hex_literal()))?;
        self.sync.events().emit(&WalletEvent::WalletUpdated(wallet.clone()));
        Ok(wallet)
    }

    pub async fn delete_wallet(&self, address: &AccountAddress) -> Result<(), WalletError> {
        self.sync.delete_wallet(address).await
    }

    pub fn subscribe<F>(&self, kind: WalletEventKind, listener: F) -> Result<SubscriptionId, WalletError>
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.sync.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, WalletError> {
        self.sync.unsubscribe(id)
    }

    // ============================================================================
    // Transactions
    // ============================================================================

    /// Turn the account into a slow wallet; returns the transaction hash
    pub async fn set_slow(&self, address: &AccountAddress) -> Result<Option<String>, WalletError> {
        let submitted = self
            .transactions
            .submit_entry_function(address, SLOW_WALLET_MODULE, SET_SLOW_FUNCTION, vec![], vec![])
            .await?;
        Ok(submitted.hash)
    }

    pub async fn submit_entry_function(
        &self,
        sender: &AccountAddress,
        module: &str,
        function: &str,
        ty_args: Vec<TypeTag>,
        args: Vec<Vec<u8>>,
    ) -> Result<SubmittedTransaction, WalletError> {
        self.transactions
            .submit_entry_function(sender, module, function, ty_args, args)
            .await
    }
}
