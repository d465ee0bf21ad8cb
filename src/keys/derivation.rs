use bip39::Mnemonic;
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use sha3::{Digest, Sha3_256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::WalletError;
use crate::transaction::AccountAddress;

type HmacSha512 = Hmac<Sha512>;

/// SLIP-0010 path `m/44'/637'/0'/0'/0'`, every level hardened
pub const DERIVATION_PATH: [u32; 5] = [44, 637, 0, 0, 0];

/// Authentication-key scheme byte for single Ed25519 keys
pub const ED25519_SCHEME: u8 = 0x00;

const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Ed25519 private key; wiped on drop and never printed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::InvalidKey(format!("private key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, WalletError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str.trim().trim_start_matches("0x"))
                .map_err(|e| WalletError::InvalidKey(format!("private key is not hex: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Uppercase hex form written to the secure store
    pub fn to_hex_upper(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode_upper(self.0))
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }

    pub fn public_key(&self) -> PublicKey {
        private_key_to_public_key(self)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

macro_rules! hex_key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
                let array: [u8; 32] = bytes.try_into().map_err(|_| {
                    WalletError::InvalidKey(format!(
                        concat!(stringify!($name), " must be 32 bytes, got {}"),
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }

            pub fn from_hex(hex_str: &str) -> Result<Self, WalletError> {
                let bytes = hex::decode(hex_str.trim().trim_start_matches("0x")).map_err(|e| {
                    WalletError::InvalidKey(format!(concat!(stringify!($name), " is not hex: {}"), e))
                })?;
                Self::from_bytes(&bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn to_hex_upper(&self) -> String {
                hex::encode_upper(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex_upper())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    Self::from_hex(&s).map_err(D::Error::custom)
                } else {
                    <[u8; 32]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

hex_key_type!(
    /// Ed25519 public key
    PublicKey
);

hex_key_type!(
    /// sha3-256(public key ‖ scheme), bound to the key's originating account
    AuthKey
);

impl AuthKey {
    /// Address of an account created from this key and never rotated
    pub fn to_account_address(&self) -> AccountAddress {
        AccountAddress::new(self.0)
    }
}

/// BIP-39 mnemonic → SLIP-0010 ed25519 private key along [`DERIVATION_PATH`]
pub fn mnemonic_to_private_key(mnemonic: &str) -> Result<PrivateKey, WalletError> {
    let mnemonic =
        Mnemonic::parse(mnemonic).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));

    let (mut key, mut chain_code) = hmac_split(ED25519_SEED_KEY, &seed[..])?;
    for index in DERIVATION_PATH {
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        data.push(0u8);
        data.extend_from_slice(&key[..]);
        data.extend_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());
        (key, chain_code) = hmac_split(&chain_code[..], &data)?;
    }

    Ok(PrivateKey::new(*key))
}

pub fn private_key_to_public_key(private_key: &PrivateKey) -> PublicKey {
    PublicKey::new(private_key.signing_key().verifying_key().to_bytes())
}

pub fn public_key_to_auth_key(public_key: &PublicKey) -> AuthKey {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key.as_bytes());
    hasher.update([ED25519_SCHEME]);
    AuthKey::new(hasher.finalize().into())
}

/// HMAC-SHA512 and split into (key, chain code)
fn hmac_split(
    key: &[u8],
    data: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), WalletError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(data);
    let mut output = mac.finalize().into_bytes();

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    output.as_mut_slice().zeroize();
    Ok((left, right))
}
