//! Resolves a transaction's inputs against the dependencies supplied with it.
//!
//! Outputs and commands are opaque to the notary, so contract checks are
//! limited to what an optional [`ContractRule`] enforces.

use crate::ports::{TransactionVerifier, VerificationError, VerifiedTransaction};
use async_trait::async_trait;
use shared_types::{SignedTransaction, TransactionId, WireTransaction};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Extra contract check applied after resolution.
pub type ContractRule = Arc<dyn Fn(&WireTransaction) -> Result<(), String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ResolvingVerifier {
    rule: Option<ContractRule>,
}

impl ResolvingVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(rule: ContractRule) -> Self {
        Self { rule: Some(rule) }
    }
}

#[async_trait]
impl TransactionVerifier for ResolvingVerifier {
    async fn verify(
        &self,
        transaction: &SignedTransaction,
        dependencies: &[SignedTransaction],
    ) -> Result<VerifiedTransaction, VerificationError> {
        // Dependencies are addressed by recomputed id, never a claimed one.
        let by_id: HashMap<TransactionId, &WireTransaction> =
            dependencies.iter().map(|dep| (dep.id(), &dep.tx)).collect();

        for input in &transaction.tx.inputs {
            let produced = by_id
                .get(&input.txhash)
                .is_some_and(|dep| (input.index as usize) < dep.outputs.len());
            if !produced {
                return Err(VerificationError::UnresolvedInput(*input));
            }
        }

        if let Some(rule) = &self.rule {
            rule(&transaction.tx).map_err(VerificationError::ContractRejected)?;
        }

        let id = transaction.id();
        debug!(tx_id = %id, dependencies = dependencies.len(), "Transaction resolved");
        Ok(VerifiedTransaction {
            id,
            resolved_inputs: transaction.tx.inputs.len(),
        })
    }
}
