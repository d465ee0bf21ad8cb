//! Ledger sync engine
//!
//! `sync_wallet` runs two passes under a per-address lock:
//!
//! - History: follow the indexer's movement pages (newest first), upsert one
//!   Movement per edge and insert the embedded transaction into the table
//!   for its type. Transactions are immutable, so inserts never overwrite.
//! - Resources: read the account's resources from the RPC and reconcile
//!   coin balances and slow wallet state.
//!
//! A bad edge or resource is logged and skipped. An unreachable indexer or
//! RPC fails the whole call.

use std::sync::Arc;

use super::events::{EventBus, SubscriptionId, WalletEvent, WalletEventKind};
use super::locks::AddressLocks;
use crate::error::WalletError;
use crate::ledger::{
    AccountResource, IndexedTransaction, IndexerClient, MovementEdge, Order, ResourceKind,
    RpcClient,
};
use crate::storage::models::validate_amount;
use crate::storage::{
    Balance, BlockMetadataTransaction, CoinRepository, GenesisTransaction, LedgerStore,
    LedgerTransaction, Movement, ScriptUserTransaction, SlowWallet, UserTransaction,
    WalletRepository,
};
use crate::transaction::AccountAddress;

pub const DEFAULT_PAGE_SIZE: u32 = 1_000;

/// What one `sync_wallet` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Movement pages fetched from the indexer
    pub pages: usize,
    pub movements: usize,
    /// Transaction rows that were not already stored
    pub transactions_inserted: usize,
    pub balances: usize,
    pub slow_wallets: usize,
    /// Edges and resources that could not be mapped
    pub skipped: usize,
    /// False when the indexer has no record of the account
    pub account_found: bool,
}

pub struct LedgerSyncEngine {
    indexer: Arc<dyn IndexerClient>,
    rpc: Arc<dyn RpcClient>,
    ledger: Arc<dyn LedgerStore>,
    coins: Arc<dyn CoinRepository>,
    wallets: Arc<dyn WalletRepository>,
    events: Arc<EventBus>,
    locks: AddressLocks,
    page_size: u32,
}

impl LedgerSyncEngine {
    pub fn new(
        indexer: Arc<dyn IndexerClient>,
        rpc: Arc<dyn RpcClient>,
        ledger: Arc<dyn LedgerStore>,
        coins: Arc<dyn CoinRepository>,
        wallets: Arc<dyn WalletRepository>,
    ) -> Self {
        Self {
            indexer,
            rpc,
            ledger,
            coins,
            wallets,
            events: Arc::new(EventBus::new()),
            locks: AddressLocks::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn sync_wallet(&self, address: &AccountAddress) -> Result<SyncReport, WalletError> {
        let _guard = self.locks.lock(address).await?;
        log::info!("🔄 Syncing wallet {}", address);

        let mut report = SyncReport::default();
        self.sync_history(address, &mut report).await?;
        self.sync_resources(address, &mut report).await?;

        log::info!(
            "✅ Synced {}: {} movements, {} new transactions, {} balances, {} slow wallet, {} skipped",
            address,
            report.movements,
            report.transactions_inserted,
            report.balances,
            report.slow_wallets,
            report.skipped
        );
        Ok(report)
    }

    async fn sync_history(
        &self,
        address: &AccountAddress,
        report: &mut SyncReport,
    ) -> Result<(), WalletError> {
        let mut after: Option<String> = None;

        loop {
            let page = self
                .indexer
                .get_account_movements(address, Order::Desc, self.page_size, after.as_deref())
                .await?;
            let Some(page) = page else {
                if report.pages == 0 {
                    log::info!("Indexer has no account {}, nothing to sync", address);
                }
                break;
            };
            report.pages += 1;
            report.account_found = true;

            if page.edges.is_empty() {
                break;
            }

            let mut movements = Vec::with_capacity(page.edges.len());
            let mut transactions = Vec::new();
            for edge in page.edges {
                match edge.and_then(|edge| classify_edge(address, edge)) {
                    Ok((movement, transaction)) => {
                        movements.push(movement);
                        transactions.extend(transaction);
                    }
                    Err(e) => {
                        log::warn!("⚠️  Skipping movement for {}: {}", address, e);
                        report.skipped += 1;
                    }
                }
            }

            report.movements += self.ledger.upsert_movements(&movements).await?;
            report.transactions_inserted += self.ledger.insert_transactions(&transactions).await?;
            log::debug!(
                "Page {} for {}: {} movements, {} transactions",
                report.pages,
                address,
                movements.len(),
                transactions.len()
            );

            if !page.has_next_page {
                break;
            }
            match page.end_cursor {
                Some(cursor) if after.as_deref() != Some(cursor.as_str()) => after = Some(cursor),
                _ => {
                    log::warn!("⚠️  Movement cursor for {} did not advance, stopping", address);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn sync_resources(
        &self,
        address: &AccountAddress,
        report: &mut SyncReport,
    ) -> Result<(), WalletError> {
        let resources = self.rpc.get_account_resources(address).await?;
        log::debug!("{} resources for {}", resources.len(), address);

        for resource in resources {
            let result = match resource {
                Ok(resource) => self.reconcile_resource(address, &resource).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(ResourceKind::CoinStore { .. }) => report.balances += 1,
                Ok(ResourceKind::SlowWallet { .. }) => report.slow_wallets += 1,
                Ok(ResourceKind::Other) => {}
                Err(e @ WalletError::MalformedResource { .. }) => {
                    log::warn!("⚠️  Skipping resource for {}: {}", address, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn reconcile_resource(
        &self,
        address: &AccountAddress,
        resource: &AccountResource,
    ) -> Result<ResourceKind, WalletError> {
        let kind = resource.classify()?;
        match &kind {
            ResourceKind::CoinStore { coin_type, value } => {
                let coin = self.coins.get_or_create_coin(coin_type).await?;
                self.ledger
                    .upsert_balance(&Balance {
                        coin_id: coin.id,
                        wallet_address: *address,
                        amount: value.clone(),
                    })
                    .await?;
            }
            ResourceKind::SlowWallet {
                transferred,
                unlocked,
            } => {
                self.ledger
                    .upsert_slow_wallet(&SlowWallet {
                        wallet_address: *address,
                        transferred: transferred.clone(),
                        unlocked: unlocked.clone(),
                    })
                    .await?;
            }
            ResourceKind::Other => {}
        }
        Ok(kind)
    }

    /// Remove the wallet row and notify `WalletRemoved` listeners.
    /// Movements, balances and keys are kept.
    pub async fn delete_wallet(&self, address: &AccountAddress) -> Result<(), WalletError> {
        if !self.wallets.delete_wallet(address).await? {
            return Err(WalletError::WalletNotFound(address.to_hex_literal()));
        }
        log::info!("🗑️  Wallet {} removed", address);
        self.events.emit(&WalletEvent::WalletRemoved(*address));
        Ok(())
    }

    pub fn subscribe<F>(&self, kind: WalletEventKind, listener: F) -> Result<SubscriptionId, WalletError>
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, WalletError> {
        self.events.unsubscribe(id)
    }
}

/// Map one indexer edge to its Movement row and, for known types, its
/// transaction row
pub fn classify_edge(
    address: &AccountAddress,
    edge: MovementEdge,
) -> Result<(Movement, Option<LedgerTransaction>), WalletError> {
    let node = edge.node;
    let movement = Movement {
        version: node.version,
        wallet_address: *address,
        balance: movement_amount("balance", &node.balance)?,
        locked_balance: movement_amount("lockedBalance", &node.locked_balance)?,
        unlocked_amount: movement_amount("unlockedAmount", &node.unlocked_amount)?,
        locked_amount: movement_amount("lockedAmount", &node.locked_amount)?,
    };

    let transaction = match node.transaction {
        IndexedTransaction::UserTransaction {
            version,
            hash,
            sender,
            module_address,
            module_name,
            function_name,
            arguments,
            success,
            timestamp,
        } => Some(LedgerTransaction::User(UserTransaction {
            version,
            hash: decode_hash(&hash)?,
            sender: decode_address("sender", &sender)?,
            module_address: decode_address("moduleAddress", &module_address)?,
            module_name,
            function_name,
            arguments,
            success,
            timestamp,
        })),
        IndexedTransaction::ScriptUserTransaction {
            version,
            hash,
            sender,
            success,
            timestamp,
        } => Some(LedgerTransaction::Script(ScriptUserTransaction {
            version,
            hash: decode_hash(&hash)?,
            sender: decode_address("sender", &sender)?,
            success,
            timestamp,
        })),
        IndexedTransaction::BlockMetadataTransaction {
            version,
            hash,
            epoch,
            timestamp,
        } => Some(LedgerTransaction::BlockMetadata(BlockMetadataTransaction {
            version,
            hash: decode_hash(&hash)?,
            epoch,
            timestamp,
        })),
        IndexedTransaction::GenesisTransaction { version, hash } => {
            Some(LedgerTransaction::Genesis(GenesisTransaction {
                version,
                hash: decode_hash(&hash)?,
            }))
        }
        IndexedTransaction::Unknown => {
            log::debug!("Dropping transaction of unknown type at version {}", node.version);
            None
        }
    };

    Ok((movement, transaction))
}

fn movement_amount(field: &str, value: &str) -> Result<String, WalletError> {
    validate_amount(field, value).map_err(|e| WalletError::MalformedMovement(e.to_string()))
}

fn decode_hash(hash: &str) -> Result<Vec<u8>, WalletError> {
    hex::decode(hash.trim_start_matches("0x"))
        .map_err(|e| WalletError::MalformedMovement(format!("hash {:?}: {}", hash, e)))
}

fn decode_address(field: &str, value: &str) -> Result<AccountAddress, WalletError> {
    AccountAddress::from_hex(value)
        .map_err(|e| WalletError::MalformedMovement(format!("{}: {}", field, e)))
}
