//! Transaction construction, signing and submission
//!
//! - Canonical transaction types and BCS encoding
//! - Builder, signer, submitter
//! - `TransactionManager` chaining the three per sender

pub mod builder;
pub mod signer;
pub mod submitter;
pub mod types;

pub use builder::{GasConfig, TransactionBuilder};
pub use signer::{sign_raw_transaction, signing_message, Signer, RAW_TRANSACTION_SALT};
pub use submitter::{SubmittedTransaction, Submitter};
pub use types::{
    AccountAddress, ChainId, Ed25519PublicKey, Ed25519Signature, EntryFunction, Identifier,
    ModuleId, RawTransaction, SignedTransaction, StructTag, TransactionAuthenticator,
    TransactionPayload, TypeTag,
};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{StorageError, WalletError};
use crate::sync::AddressLocks;

/// Build → sign → submit, one sender at a time
///
/// The per-sender lock covers the sequence number read through submission.
/// Accepted sequence numbers are remembered until their expiration so that a
/// second send before the first commits does not reuse the same number.
pub struct TransactionManager {
    builder: TransactionBuilder,
    signer: Signer,
    submitter: Submitter,
    locks: AddressLocks,
    pending: Mutex<HashMap<AccountAddress, SubmittedTransaction>>,
}

impl TransactionManager {
    pub fn new(builder: TransactionBuilder, signer: Signer, submitter: Submitter) -> Self {
        Self {
            builder,
            signer,
            submitter,
            locks: AddressLocks::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Call `module::function` as `sender`, e.g. `("0x1::slow_wallet", "user_set_slow")`
    pub async fn submit_entry_function(
        &self,
        sender: &AccountAddress,
        module: &str,
        function: &str,
        ty_args: Vec<TypeTag>,
        args: Vec<Vec<u8>>,
    ) -> Result<SubmittedTransaction, WalletError> {
        let entry_function =
            EntryFunction::new(module.parse()?, Identifier::new(function)?, ty_args, args);
        self.submit(sender, entry_function).await
    }

    pub async fn submit(
        &self,
        sender: &AccountAddress,
        entry_function: EntryFunction,
    ) -> Result<SubmittedTransaction, WalletError> {
        let _guard = self.locks.lock(sender).await?;

        let on_chain = self.builder.fetch_sequence_number(sender).await?;
        let sequence_number = match self.pending_next(sender)? {
            Some(next) if next > on_chain => {
                log::debug!(
                    "{} has an accepted transaction pending, using sequence {} over {}",
                    sender,
                    next,
                    on_chain
                );
                next
            }
            _ => on_chain,
        };
        let chain_id = self.builder.resolve_chain_id().await?;

        let raw_txn = self
            .builder
            .build(*sender, sequence_number, chain_id, entry_function);
        let signed = self.signer.sign(raw_txn).await?;
        let submitted = self.submitter.submit(&signed).await?;

        self.pending
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?
            .insert(*sender, submitted.clone());
        Ok(submitted)
    }

    /// Sequence number after the last accepted, unexpired submission
    fn pending_next(&self, sender: &AccountAddress) -> Result<Option<u64>, WalletError> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        match pending.get(sender) {
            Some(last) if last.expiration_timestamp_secs > now => Ok(Some(last.sequence_number + 1)),
            Some(_) => {
                pending.remove(sender);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
