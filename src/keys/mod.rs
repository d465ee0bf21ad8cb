//! Key material
//!
//! - Derivation: mnemonic → private → public → auth key
//! - Secure store contract and backends
//! - Keychain orchestrating both

pub mod derivation;
pub mod keychain;
pub mod secure_store;

pub use derivation::{
    mnemonic_to_private_key, private_key_to_public_key, public_key_to_auth_key, AuthKey,
    PrivateKey, PublicKey,
};
pub use keychain::Keychain;
pub use secure_store::{EncryptedStoreRule, FileSecureStore, MemorySecureStore, SecureKeyStore};
