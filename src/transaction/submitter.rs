use std::sync::Arc;

use super::types::{AccountAddress, SignedTransaction};
use crate::error::WalletError;
use crate::ledger::RpcClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub sender: AccountAddress,
    pub sequence_number: u64,
    pub expiration_timestamp_secs: u64,
    /// Hash reported by the ledger, `0x`-prefixed
    pub hash: Option<String>,
}

/// Sends signed transactions to the ledger's submission endpoint
pub struct Submitter {
    rpc: Arc<dyn RpcClient>,
}

impl Submitter {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }

    /// Anything but an accepted response is returned as an error
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<SubmittedTransaction, WalletError> {
        let body = signed.to_bcs()?;
        log::info!(
            "📤 Submitting transaction {} #{} ({} bytes)",
            signed.raw_txn.sender,
            signed.raw_txn.sequence_number,
            body.len()
        );

        let hash = self.rpc.submit_transaction(body).await?;

        Ok(SubmittedTransaction {
            sender: signed.raw_txn.sender,
            sequence_number: signed.raw_txn.sequence_number,
            expiration_timestamp_secs: signed.raw_txn.expiration_timestamp_secs,
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derivation::tests::TEST_PRIVATE_KEY;
    use crate::keys::{AuthKey, PrivateKey};
    use crate::ledger::AccountResource;
    use crate::transaction::sign_raw_transaction;
    use crate::transaction::types::tests::set_slow_raw_txn;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingRpc {
        bodies: Mutex<Vec<Vec<u8>>>,
        reject_with: Option<u16>,
    }

    #[async_trait]
    impl RpcClient for RecordingRpc {
        async fn get_account_resources(
            &self,
            _: &AccountAddress,
        ) -> Result<Vec<Result<AccountResource, WalletError>>, WalletError> {
            Ok(Vec::new())
        }

        async fn get_sequence_number(&self, _: &AccountAddress) -> Result<u64, WalletError> {
            Ok(0)
        }

        async fn get_chain_id(&self) -> Result<u8, WalletError> {
            Ok(1)
        }

        async fn get_originating_address(&self, auth_key: &AuthKey) -> Result<AccountAddress, WalletError> {
            Ok(auth_key.to_account_address())
        }

        async fn submit_transaction(&self, signed_txn: Vec<u8>) -> Result<Option<String>, WalletError> {
            self.bodies.lock().unwrap().push(signed_txn);
            match self.reject_with {
                Some(status) => Err(WalletError::SubmissionRejected {
                    status,
                    message: "rejected".into(),
                }),
                None => Ok(Some("0xfeed".into())),
            }
        }
    }

    fn signed() -> SignedTransaction {
        sign_raw_transaction(
            set_slow_raw_txn(),
            &PrivateKey::from_hex(TEST_PRIVATE_KEY).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_sends_bcs_and_returns_hash() {
        let rpc = Arc::new(RecordingRpc {
            bodies: Mutex::new(Vec::new()),
            reject_with: None,
        });
        let submitter = Submitter::new(rpc.clone());
        let signed = signed();

        let submitted = submitter.submit(&signed).await.unwrap();
        assert_eq!(submitted.hash.as_deref(), Some("0xfeed"));
        assert_eq!(submitted.sequence_number, 7);
        assert_eq!(rpc.bodies.lock().unwrap()[0], signed.to_bcs().unwrap());
    }

    #[tokio::test]
    async fn test_rejection_reaches_caller() {
        let rpc = Arc::new(RecordingRpc {
            bodies: Mutex::new(Vec::new()),
            reject_with: Some(400),
        });
        let result = Submitter::new(rpc).submit(&signed()).await;
        assert!(matches!(
            result,
            Err(WalletError::SubmissionRejected { status: 400, .. })
        ));
    }
}
