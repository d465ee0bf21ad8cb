//! Error types for wallet operations
//!
//! One enum for everything a caller can observe. Variants are split so that
//! "no such key", "network unreachable" and "chain rejected the transaction"
//! stay distinguishable all the way up.

use thiserror::Error;

/// Core error type for keychain, sync and transaction operations
#[derive(Error, Debug)]
pub enum WalletError {
    /// No private key is available for the requested key or sending address
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The indexer or ledger has no record of the account
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// A ledger resource did not have the expected shape
    #[error("Malformed resource {resource_type}: {reason}")]
    MalformedResource {
        resource_type: String,
        reason: String,
    },

    /// A movement edge returned by the indexer could not be mapped
    #[error("Malformed movement: {0}")]
    MalformedMovement(String),

    /// Indexer or RPC unreachable, or it answered with something unusable
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The submission endpoint answered with anything other than 202 Accepted
    #[error("Submission rejected (HTTP {status}): {message}")]
    SubmissionRejected { status: u16, message: String },

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Secure store error: {0}")]
    SecureStore(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bcs::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::TransportFailure(err.to_string())
    }
}

impl WalletError {
    pub fn malformed_resource(resource_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResource {
            resource_type: resource_type.into(),
            reason: reason.into(),
        }
    }

    /// True for failures a caller may fix by retrying the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_is_distinguishable() {
        let missing = WalletError::KeyNotFound("ABCD".into());
        let offline = WalletError::TransportFailure("connection refused".into());
        let rejected = WalletError::SubmissionRejected {
            status: 400,
            message: "SEQUENCE_NUMBER_TOO_OLD".into(),
        };

        assert!(missing.to_string().starts_with("Key not found"));
        assert!(offline.to_string().starts_with("Transport failure"));
        assert!(rejected.to_string().contains("HTTP 400"));

        assert!(offline.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!rejected.is_retryable());
    }
}
