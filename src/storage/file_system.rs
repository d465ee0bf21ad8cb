use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::models::{
    Balance, BlockMetadataTransaction, Coin, GenesisTransaction, LedgerTransaction, Movement,
    ScriptUserTransaction, SlowWallet, UserTransaction, Wallet, WalletBalance, WalletKey,
};
use super::repository::{CoinRepository, KeyRepository, LedgerStore, WalletRepository};
use crate::error::{StorageError, WalletError};
use crate::keys::{AuthKey, PublicKey};
use crate::transaction::AccountAddress;

#[derive(Default)]
struct Tables {
    keys: BTreeMap<PublicKey, WalletKey>,
    wallets: BTreeMap<AccountAddress, Wallet>,
    movements: BTreeMap<(u64, AccountAddress), Movement>,
    user_transactions: BTreeMap<u64, UserTransaction>,
    script_user_transactions: BTreeMap<u64, ScriptUserTransaction>,
    block_metadata_transactions: BTreeMap<u64, BlockMetadataTransaction>,
    genesis_transactions: BTreeMap<u64, GenesisTransaction>,
    coins: BTreeMap<u64, Coin>,
    balances: BTreeMap<(u64, AccountAddress), Balance>,
    slow_wallets: BTreeMap<AccountAddress, SlowWallet>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Table {
    Keys,
    Wallets,
    Movements,
    UserTransactions,
    ScriptUserTransactions,
    BlockMetadataTransactions,
    GenesisTransactions,
    Coins,
    Balances,
    SlowWallets,
}

impl Table {
    fn file_name(self) -> &'static str {
        match self {
            Table::Keys => "keys.json",
            Table::Wallets => "wallets.json",
            Table::Movements => "movements.json",
            Table::UserTransactions => "user_transactions.json",
            Table::ScriptUserTransactions => "script_user_transactions.json",
            Table::BlockMetadataTransactions => "block_metadata_transactions.json",
            Table::GenesisTransactions => "genesis_transactions.json",
            Table::Coins => "coins.json",
            Table::Balances => "balances.json",
            Table::SlowWallets => "slow_wallets.json",
        }
    }
}

/// Local wallet database
///
/// Tables live in memory. With a base directory every write also rewrites
/// the touched table as `<table>.json`, and `new_with_base_dir` reloads them.
/// Writes are staged on a copy of the table and only replace the in-memory
/// table once the file is written, so a failed write changes nothing.
pub struct Storage {
    base_path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Storage {
    /// Storage that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            base_path: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Create storage persisted under `base_path`, loading any existing tables
    pub fn new_with_base_dir(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;

        let mut tables = Tables::default();
        for key in load_table::<WalletKey>(&base_path, Table::Keys)? {
            tables.keys.insert(key.public_key, key);
        }
        for wallet in load_table::<Wallet>(&base_path, Table::Wallets)? {
            tables.wallets.insert(wallet.address, wallet);
        }
        for movement in load_table::<Movement>(&base_path, Table::Movements)? {
            tables.movements.insert(movement.key(), movement);
        }
        for tx in load_table::<UserTransaction>(&base_path, Table::UserTransactions)? {
            tables.user_transactions.insert(tx.version, tx);
        }
        for tx in load_table::<ScriptUserTransaction>(&base_path, Table::ScriptUserTransactions)? {
            tables.script_user_transactions.insert(tx.version, tx);
        }
        for tx in
            load_table::<BlockMetadataTransaction>(&base_path, Table::BlockMetadataTransactions)?
        {
            tables.block_metadata_transactions.insert(tx.version, tx);
        }
        for tx in load_table::<GenesisTransaction>(&base_path, Table::GenesisTransactions)? {
            tables.genesis_transactions.insert(tx.version, tx);
        }
        for coin in load_table::<Coin>(&base_path, Table::Coins)? {
            tables.coins.insert(coin.id, coin);
        }
        for balance in load_table::<Balance>(&base_path, Table::Balances)? {
            tables
                .balances
                .insert((balance.coin_id, balance.wallet_address), balance);
        }
        for slow_wallet in load_table::<SlowWallet>(&base_path, Table::SlowWallets)? {
            tables
                .slow_wallets
                .insert(slow_wallet.wallet_address, slow_wallet);
        }

        log::debug!(
            "Loaded storage from {:?}: {} keys, {} wallets, {} movements",
            base_path,
            tables.keys.len(),
            tables.wallets.len(),
            tables.movements.len()
        );

        Ok(Self {
            base_path: Some(base_path),
            tables: RwLock::new(tables),
        })
    }

    /// Base directory, if this storage is persisted
    pub fn base_dir(&self) -> Option<&PathBuf> {
        self.base_path.as_ref()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    /// Rewrite one table file; no-op for in-memory storage
    fn persist<'a, T, I>(&self, table: Table, rows: I) -> Result<(), StorageError>
    where
        T: Serialize + 'a,
        I: Iterator<Item = &'a T>,
    {
        match &self.base_path {
            Some(base_path) => save_table(base_path, table, rows),
            None => Ok(()),
        }
    }
}

fn load_table<T: DeserializeOwned>(base_path: &Path, table: Table) -> Result<Vec<T>, StorageError> {
    let path = base_path.join(table.file_name());
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write to a sibling temp file, then rename over the table
fn save_table<'a, T, I>(base_path: &Path, table: Table, rows: I) -> Result<(), StorageError>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    let rows: Vec<&T> = rows.collect();
    let json = serde_json::to_string_pretty(&rows)?;
    let path = base_path.join(table.file_name());
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

#[async_trait]
impl KeyRepository for Storage {
    async fn save_key(&self, key: &WalletKey) -> Result<(), WalletError> {
        let mut tables = self.write()?;
        let mut keys = tables.keys.clone();
        keys.insert(key.public_key, *key);
        self.persist(Table::Keys, keys.values())?;
        tables.keys = keys;
        Ok(())
    }

    async fn delete_key(&self, public_key: &PublicKey) -> Result<(), WalletError> {
        let mut tables = self.write()?;
        let mut keys = tables.keys.clone();
        if keys.remove(public_key).is_some() {
            self.persist(Table::Keys, keys.values())?;
            tables.keys = keys;
        }
        Ok(())
    }

    async fn get_wallet_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<WalletKey>, WalletError> {
        Ok(self.read()?.keys.get(public_key).copied())
    }

    async fn get_wallet_key_from_auth_key(
        &self,
        auth_key: &AuthKey,
    ) -> Result<Option<WalletKey>, WalletError> {
        Ok(self
            .read()?
            .keys
            .values()
            .find(|key| &key.auth_key == auth_key)
            .copied())
    }

    async fn get_wallet_keys(&self) -> Result<Vec<WalletKey>, WalletError> {
        Ok(self.read()?.keys.values().copied().collect())
    }
}

#[async_trait]
impl WalletRepository for Storage {
    async fn save_wallet(
        &self,
        address: AccountAddress,
        auth_key: AuthKey,
    ) -> Result<Wallet, WalletError> {
        let mut tables = self.write()?;
        if let Some(existing) = tables.wallets.get(&address) {
            return Ok(existing.clone());
        }
        let wallet = Wallet {
            address,
            auth_key,
            label: String::new(),
            created_at: Utc::now(),
        };
        let mut wallets = tables.wallets.clone();
        wallets.insert(address, wallet.clone());
        self.persist(Table::Wallets, wallets.values())?;
        tables.wallets = wallets;
        Ok(wallet)
    }

    async fn get_wallet(&self, address: &AccountAddress) -> Result<Option<Wallet>, WalletError> {
        Ok(self.read()?.wallets.get(address).cloned())
    }

    async fn get_wallets(&self) -> Result<Vec<Wallet>, WalletError> {
        let mut wallets: Vec<Wallet> = self.read()?.wallets.values().cloned().collect();
        wallets.sort_by_key(|wallet| wallet.created_at);
        Ok(wallets)
    }

    async fn get_wallets_from_auth_key(
        &self,
        auth_key: &AuthKey,
    ) -> Result<Vec<Wallet>, WalletError> {
        Ok(self
            .read()?
            .wallets
            .values()
            .filter(|wallet| &wallet.auth_key == auth_key)
            .cloned()
            .collect())
    }

    async fn set_wallet_label(
        &self,
        address: &AccountAddress,
        label: &str,
    ) -> Result<bool, WalletError> {
        let mut tables = self.write()?;
        let mut wallets = tables.wallets.clone();
        let Some(wallet) = wallets.get_mut(address) else {
            return Ok(false);
        };
        wallet.label = label.to_string();
        self.persist(Table::Wallets, wallets.values())?;
        tables.wallets = wallets;
        Ok(true)
    }

    async fn delete_wallet(&self, address: &AccountAddress) -> Result<bool, WalletError> {
        let mut tables = self.write()?;
        let mut wallets = tables.wallets.clone();
        if wallets.remove(address).is_none() {
            return Ok(false);
        }
        self.persist(Table::Wallets, wallets.values())?;
        tables.wallets = wallets;
        Ok(true)
    }
}

#[async_trait]
impl CoinRepository for Storage {
    async fn get_or_create_coin(&self, type_tag: &str) -> Result<Coin, WalletError> {
        let mut tables = self.write()?;
        if let Some(coin) = tables.coins.values().find(|coin| coin.type_tag == type_tag) {
            return Ok(coin.clone());
        }
        let id = tables.coins.keys().next_back().map_or(1, |last| last + 1);
        let coin = Coin {
            id,
            type_tag: type_tag.to_string(),
        };
        let mut coins = tables.coins.clone();
        coins.insert(id, coin.clone());
        self.persist(Table::Coins, coins.values())?;
        tables.coins = coins;
        log::debug!("New coin #{}: {}", id, type_tag);
        Ok(coin)
    }

    async fn get_coin(&self, id: u64) -> Result<Option<Coin>, WalletError> {
        Ok(self.read()?.coins.get(&id).cloned())
    }
}

#[async_trait]
impl LedgerStore for Storage {
    async fn upsert_movements(&self, movements: &[Movement]) -> Result<usize, WalletError> {
        if movements.is_empty() {
            return Ok(0);
        }
        let mut tables = self.write()?;
        let mut staged = tables.movements.clone();
        for movement in movements {
            staged.insert(movement.key(), movement.clone());
        }
        self.persist(Table::Movements, staged.values())?;
        tables.movements = staged;
        Ok(movements.len())
    }

    async fn insert_transactions(
        &self,
        transactions: &[LedgerTransaction],
    ) -> Result<usize, WalletError> {
        let mut tables = self.write()?;
        let mut user = Staged::new(&tables.user_transactions);
        let mut script = Staged::new(&tables.script_user_transactions);
        let mut block_metadata = Staged::new(&tables.block_metadata_transactions);
        let mut genesis = Staged::new(&tables.genesis_transactions);

        for transaction in transactions {
            let version = transaction.version();
            match transaction {
                LedgerTransaction::User(tx) => user.insert_if_absent(version, tx),
                LedgerTransaction::Script(tx) => script.insert_if_absent(version, tx),
                LedgerTransaction::BlockMetadata(tx) => block_metadata.insert_if_absent(version, tx),
                LedgerTransaction::Genesis(tx) => genesis.insert_if_absent(version, tx),
            }
        }
        let inserted = user.inserted + script.inserted + block_metadata.inserted + genesis.inserted;
        let (user, script, block_metadata, genesis) = (
            user.into_changed(),
            script.into_changed(),
            block_metadata.into_changed(),
            genesis.into_changed(),
        );

        // Each table is swapped in as soon as its own file is written
        if let Some(rows) = user {
            self.persist(Table::UserTransactions, rows.values())?;
            tables.user_transactions = rows;
        }
        if let Some(rows) = script {
            self.persist(Table::ScriptUserTransactions, rows.values())?;
            tables.script_user_transactions = rows;
        }
        if let Some(rows) = block_metadata {
            self.persist(Table::BlockMetadataTransactions, rows.values())?;
            tables.block_metadata_transactions = rows;
        }
        if let Some(rows) = genesis {
            self.persist(Table::GenesisTransactions, rows.values())?;
            tables.genesis_transactions = rows;
        }
        Ok(inserted)
    }

    async fn upsert_balance(&self, balance: &Balance) -> Result<(), WalletError> {
        let mut tables = self.write()?;
        let mut balances = tables.balances.clone();
        balances
            .entry((balance.coin_id, balance.wallet_address))
            .and_modify(|existing| existing.amount = balance.amount.clone())
            .or_insert_with(|| balance.clone());
        self.persist(Table::Balances, balances.values())?;
        tables.balances = balances;
        Ok(())
    }

    async fn upsert_slow_wallet(&self, slow_wallet: &SlowWallet) -> Result<(), WalletError> {
        let mut tables = self.write()?;
        let mut slow_wallets = tables.slow_wallets.clone();
        slow_wallets.insert(slow_wallet.wallet_address, slow_wallet.clone());
        self.persist(Table::SlowWallets, slow_wallets.values())?;
        tables.slow_wallets = slow_wallets;
        Ok(())
    }

    async fn get_movements(&self, address: &AccountAddress) -> Result<Vec<Movement>, WalletError> {
        Ok(self
            .read()?
            .movements
            .values()
            .rev()
            .filter(|movement| &movement.wallet_address == address)
            .cloned()
            .collect())
    }

    async fn get_user_transactions(&self) -> Result<Vec<UserTransaction>, WalletError> {
        Ok(self.read()?.user_transactions.values().cloned().collect())
    }

    async fn get_script_user_transactions(
        &self,
    ) -> Result<Vec<ScriptUserTransaction>, WalletError> {
        Ok(self.read()?.script_user_transactions.values().cloned().collect())
    }

    async fn get_block_metadata_transactions(
        &self,
    ) -> Result<Vec<BlockMetadataTransaction>, WalletError> {
        Ok(self
            .read()?
            .block_metadata_transactions
            .values()
            .cloned()
            .collect())
    }

    async fn get_genesis_transactions(&self) -> Result<Vec<GenesisTransaction>, WalletError> {
        Ok(self.read()?.genesis_transactions.values().cloned().collect())
    }

    async fn get_balances(
        &self,
        address: &AccountAddress,
    ) -> Result<Vec<WalletBalance>, WalletError> {
        let tables = self.read()?;
        let mut balances = Vec::new();
        for balance in tables
            .balances
            .values()
            .filter(|balance| &balance.wallet_address == address)
        {
            let coin = tables.coins.get(&balance.coin_id).cloned().ok_or_else(|| {
                WalletError::Internal(format!("balance references unknown coin #{}", balance.coin_id))
            })?;
            balances.push(WalletBalance {
                coin,
                amount: balance.amount.clone(),
            });
        }
        Ok(balances)
    }

    async fn get_slow_wallet(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<SlowWallet>, WalletError> {
        Ok(self.read()?.slow_wallets.get(address).cloned())
    }
}

/// Copy of a transaction table taken on first insert
struct Staged<'a, T> {
    current: &'a BTreeMap<u64, T>,
    copy: Option<BTreeMap<u64, T>>,
    inserted: usize,
}

impl<'a, T: Clone> Staged<'a, T> {
    fn new(current: &'a BTreeMap<u64, T>) -> Self {
        Self {
            current,
            copy: None,
            inserted: 0,
        }
    }

    /// First write wins
    fn insert_if_absent(&mut self, version: u64, row: &T) {
        let rows = self.copy.get_or_insert_with(|| self.current.clone());
        if rows.contains_key(&version) {
            return;
        }
        rows.insert(version, row.clone());
        self.inserted += 1;
    }

    fn into_changed(self) -> Option<BTreeMap<u64, T>> {
        if self.inserted == 0 {
            return None;
        }
        self.copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn address(byte: u8) -> AccountAddress {
        AccountAddress::new([byte; 32])
    }

    fn movement(version: u64, balance: &str) -> Movement {
        Movement {
            version,
            wallet_address: address(1),
            balance: balance.to_string(),
            locked_balance: "0".to_string(),
            unlocked_amount: "0".to_string(),
            locked_amount: "0".to_string(),
        }
    }

    fn genesis(version: u64, hash: u8) -> LedgerTransaction {
        LedgerTransaction::Genesis(GenesisTransaction {
            version,
            hash: vec![hash],
        })
    }

    #[tokio::test]
    async fn test_movement_upsert_overwrites() {
        let storage = Storage::in_memory();
        storage.upsert_movements(&[movement(42, "100")]).await.unwrap();
        storage.upsert_movements(&[movement(42, "250")]).await.unwrap();

        let rows = storage.get_movements(&address(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance, "250");
    }

    #[tokio::test]
    async fn test_transactions_first_write_wins() {
        let storage = Storage::in_memory();
        assert_eq!(storage.insert_transactions(&[genesis(0, 0xaa)]).await.unwrap(), 1);
        assert_eq!(storage.insert_transactions(&[genesis(0, 0xbb)]).await.unwrap(), 0);

        let rows = storage.get_genesis_transactions().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hash, vec![0xaa]);
    }

    #[tokio::test]
    async fn test_coin_get_or_create_is_stable() {
        let storage = Storage::in_memory();
        let first = storage.get_or_create_coin("0x1::libra_coin::LibraCoin").await.unwrap();
        let again = storage.get_or_create_coin("0x1::libra_coin::LibraCoin").await.unwrap();
        let other = storage.get_or_create_coin("0x1::foo::Bar").await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_wallet_label_and_delete() {
        let storage = Storage::in_memory();
        let auth_key = AuthKey::new([9; 32]);
        let wallet = storage.save_wallet(address(1), auth_key).await.unwrap();
        assert_eq!(wallet.label, "");

        assert!(storage.set_wallet_label(&address(1), "savings").await.unwrap());
        assert!(!storage.set_wallet_label(&address(2), "nope").await.unwrap());
        assert_eq!(
            storage.get_wallet(&address(1)).await.unwrap().unwrap().label,
            "savings"
        );
        assert_eq!(storage.get_wallets_from_auth_key(&auth_key).await.unwrap().len(), 1);

        assert!(storage.delete_wallet(&address(1)).await.unwrap());
        assert!(!storage.delete_wallet(&address(1)).await.unwrap());
        assert!(storage.get_wallets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tables_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("db");
        let storage = Storage::new_with_base_dir(base.clone()).unwrap();
        storage.save_wallet(address(1), AuthKey::new([1; 32])).await.unwrap();
        fs::remove_dir_all(&base).unwrap();

        let result = storage.save_wallet(address(2), AuthKey::new([2; 32])).await;
        assert!(matches!(result, Err(WalletError::Storage(_))));
        assert!(storage.get_wallet(&address(2)).await.unwrap().is_none());

        assert!(storage.set_wallet_label(&address(1), "savings").await.is_err());
        assert_eq!(storage.get_wallet(&address(1)).await.unwrap().unwrap().label, "");
        assert!(storage.delete_wallet(&address(1)).await.is_err());
        assert!(storage.get_wallet(&address(1)).await.unwrap().is_some());

        let key = WalletKey {
            public_key: PublicKey::new([4; 32]),
            auth_key: AuthKey::new([4; 32]),
        };
        assert!(storage.save_key(&key).await.is_err());
        assert!(storage.get_wallet_keys().await.unwrap().is_empty());

        assert!(storage.upsert_movements(&[movement(9, "1")]).await.is_err());
        assert!(storage.get_movements(&address(1)).await.unwrap().is_empty());
        assert!(storage.insert_transactions(&[genesis(0, 0xaa)]).await.is_err());
        assert!(storage.get_genesis_transactions().await.unwrap().is_empty());
        assert!(storage.get_or_create_coin("0x1::foo::Bar").await.is_err());
        assert!(storage.get_coin(1).await.unwrap().is_none());

        // Writes go through again once the directory is back
        fs::create_dir_all(&base).unwrap();
        storage.save_wallet(address(2), AuthKey::new([2; 32])).await.unwrap();
        let reopened = Storage::new_with_base_dir(base).unwrap();
        assert_eq!(reopened.get_wallets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tables_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("db");
        {
            let storage = Storage::new_with_base_dir(base.clone()).unwrap();
            storage.save_wallet(address(3), AuthKey::new([3; 32])).await.unwrap();
            storage.upsert_movements(&[movement(7, "5")]).await.unwrap();
            let coin = storage.get_or_create_coin("0x1::foo::Bar").await.unwrap();
            storage
                .upsert_balance(&Balance {
                    coin_id: coin.id,
                    wallet_address: address(3),
                    amount: "12".to_string(),
                })
                .await
                .unwrap();
        }

        let reopened = Storage::new_with_base_dir(base).unwrap();
        assert!(reopened.get_wallet(&address(3)).await.unwrap().is_some());
        assert_eq!(reopened.get_movements(&address(1)).await.unwrap().len(), 1);

        let balances = reopened.get_balances(&address(3)).await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].coin.type_tag, "0x1::foo::Bar");
        assert_eq!(balances[0].amount, "12");
    }
}
