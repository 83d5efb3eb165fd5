//! # Transaction Validation
//!
//! Checks run in order, stopping at the first failure:
//!
//! | Step | Check | Error |
//! |------|-------|-------|
//! | a | transaction names this notary | `WrongNotary` |
//! | b | claimed id matches content; policy's resolve-and-check | `TransactionInvalid` |
//! | c | signatures verify; all required signers but the notary signed | `SignaturesInvalid` |
//! | d | time window contains the notary's clock | `TimeWindowInvalid` |

pub mod policy;

pub use policy::{NonValidatingPolicy, ValidatingPolicy, ValidationPolicy};

use crate::ports::{KeyService, TimeSource};
use shared_types::{
    short_hex, NotarisationRequest, NotaryError, Party, SignedTransaction, TransactionId,
    TransactionParts, WireTransaction,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TransactionValidator {
    notary: Party,
    policy: Arc<dyn ValidationPolicy>,
    keys: Arc<dyn KeyService>,
    time_source: Arc<dyn TimeSource>,
}

impl TransactionValidator {
    pub fn new(
        notary: Party,
        policy: Arc<dyn ValidationPolicy>,
        keys: Arc<dyn KeyService>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            notary,
            policy,
            keys,
            time_source,
        }
    }

    pub fn notary(&self) -> &Party {
        &self.notary
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Validate `request` and extract what the consensus backend commits.
    pub async fn validate(
        &self,
        request: &NotarisationRequest,
    ) -> Result<TransactionParts, NotaryError> {
        let stx = &request.transaction;
        let tx = &stx.tx;

        self.check_notary(tx)?;

        let id = tx.id();
        if id != request.tx_id {
            warn!(claimed = %request.tx_id, computed = %id, "Transaction id mismatch");
            return Err(NotaryError::TransactionInvalid(format!(
                "claimed id {} but content hashes to {}",
                request.tx_id, id
            )));
        }

        self.policy.resolve_and_check(request).await?;
        self.check_signatures(stx, &id)?;
        self.check_time_window(tx)?;

        debug!(
            tx_id = %id,
            policy = self.policy.name(),
            inputs = tx.inputs.len(),
            "Transaction valid"
        );
        Ok(TransactionParts {
            id,
            inputs: tx.inputs.clone(),
            time_window: tx.time_window,
            notary: tx.notary.clone(),
        })
    }

    fn check_notary(&self, tx: &WireTransaction) -> Result<(), NotaryError> {
        if tx.notary != self.notary {
            warn!(expected = %self.notary, actual = %tx.notary, "Transaction names another notary");
            return Err(NotaryError::WrongNotary {
                expected: self.notary.clone(),
                actual: tx.notary.clone(),
            });
        }
        Ok(())
    }

    /// The notary's own key is exempt: its signature is what the requester
    /// is asking for.
    fn check_signatures(
        &self,
        stx: &SignedTransaction,
        id: &TransactionId,
    ) -> Result<(), NotaryError> {
        for sig in &stx.sigs {
            if !self.keys.verify_signature(id.as_bytes(), &sig.bytes, &sig.by) {
                warn!(tx_id = %id, signer = %short_hex(&sig.by), "Invalid signature");
                return Err(NotaryError::SignaturesInvalid(format!(
                    "signature by {} does not verify",
                    short_hex(&sig.by)
                )));
            }
        }

        let missing = stx.missing_signers(&[self.notary.owning_key]);
        if !missing.is_empty() {
            let keys: Vec<String> = missing.iter().map(|k| short_hex(k)).collect();
            warn!(tx_id = %id, missing = ?keys, "Missing signatures");
            return Err(NotaryError::SignaturesInvalid(format!(
                "missing signatures from {}",
                keys.join(", ")
            )));
        }
        Ok(())
    }

    fn check_time_window(&self, tx: &WireTransaction) -> Result<(), NotaryError> {
        let Some(window) = tx.time_window else {
            return Ok(());
        };
        let now = self.time_source.now();
        if !window.contains(now) {
            warn!(%window, now, "Outside time window");
            return Err(NotaryError::TimeWindowInvalid {
                window,
                current_time: now,
            });
        }
        Ok(())
    }
}
