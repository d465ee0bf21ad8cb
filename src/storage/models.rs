//! Data models for wallet storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::keys::{AuthKey, PublicKey};
use crate::transaction::AccountAddress;

/// Public half of an imported key; the private key lives in the secure store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletKey {
    pub public_key: PublicKey,
    pub auth_key: AuthKey,
}

impl WalletKey {
    /// Secure store entry name for this key's private half
    pub fn store_key(&self) -> String {
        self.public_key.to_hex_upper()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: AccountAddress,
    pub auth_key: AuthKey,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Balance snapshot for one wallet at one ledger version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub version: u64,
    pub wallet_address: AccountAddress,
    pub balance: String,
    pub locked_balance: String,
    pub unlocked_amount: String,
    pub locked_amount: String,
}

impl Movement {
    pub fn key(&self) -> (u64, AccountAddress) {
        (self.version, self.wallet_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTransaction {
    pub version: u64,
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    pub sender: AccountAddress,
    pub module_address: AccountAddress,
    pub module_name: String,
    pub function_name: String,
    pub arguments: String,
    pub success: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptUserTransaction {
    pub version: u64,
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    pub sender: AccountAddress,
    pub success: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadataTransaction {
    pub version: u64,
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    pub epoch: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisTransaction {
    pub version: u64,
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
}

/// A classified ledger transaction; each variant has its own table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerTransaction {
    User(UserTransaction),
    Script(ScriptUserTransaction),
    BlockMetadata(BlockMetadataTransaction),
    Genesis(GenesisTransaction),
}

impl LedgerTransaction {
    pub fn version(&self) -> u64 {
        match self {
            Self::User(tx) => tx.version,
            Self::Script(tx) => tx.version,
            Self::BlockMetadata(tx) => tx.version,
            Self::Genesis(tx) => tx.version,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::User(_) => TransactionKind::User,
            Self::Script(_) => TransactionKind::Script,
            Self::BlockMetadata(_) => TransactionKind::BlockMetadata,
            Self::Genesis(_) => TransactionKind::Genesis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    User,
    Script,
    BlockMetadata,
    Genesis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: u64,
    pub type_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub coin_id: u64,
    pub wallet_address: AccountAddress,
    pub amount: String,
}

/// Balance row joined with its coin type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub coin: Coin,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowWallet {
    pub wallet_address: AccountAddress,
    pub transferred: String,
    pub unlocked: String,
}

/// Reject anything that is not a base-10 u128, returning it unchanged
pub fn validate_amount(field: &str, value: &str) -> Result<String, WalletError> {
    value
        .parse::<u128>()
        .map(|_| value.to_string())
        .map_err(|_| WalletError::InvalidInput(format!("{} is not a u128 amount: {:?}", field, value)))
}

/// Hex string in JSON, raw bytes otherwise
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
