//! Validating and non-validating notaries differ only in whether they
//! resolve the dependency chain and run contract verification.

use crate::ports::{TransactionVerifier, VerificationError};
use async_trait::async_trait;
use shared_types::{NotarisationRequest, NotaryError};
use std::sync::Arc;
use tracing::{error, warn};

/// Extension point of the validator between the notary check and the
/// signature check.
#[async_trait]
pub trait ValidationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve_and_check(&self, request: &NotarisationRequest) -> Result<(), NotaryError>;
}

/// Full validation: the requester reveals the dependency chain and every
/// contract must accept the transaction.
pub struct ValidatingPolicy {
    verifier: Arc<dyn TransactionVerifier>,
}

impl ValidatingPolicy {
    pub fn new(verifier: Arc<dyn TransactionVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl ValidationPolicy for ValidatingPolicy {
    fn name(&self) -> &'static str {
        "validating"
    }

    async fn resolve_and_check(&self, request: &NotarisationRequest) -> Result<(), NotaryError> {
        match self
            .verifier
            .verify(&request.transaction, &request.dependencies)
            .await
        {
            Ok(_) => Ok(()),
            Err(VerificationError::Unavailable(reason)) => {
                error!(tx_id = %request.tx_id, %reason, "Transaction verifier failed");
                Err(NotaryError::General(format!("verifier unavailable: {reason}")))
            }
            Err(e) => {
                warn!(tx_id = %request.tx_id, error = %e, "Transaction failed verification");
                Err(NotaryError::TransactionInvalid(e.to_string()))
            }
        }
    }
}

/// Only uniqueness is checked; dependencies are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonValidatingPolicy;

#[async_trait]
impl ValidationPolicy for NonValidatingPolicy {
    fn name(&self) -> &'static str {
        "non-validating"
    }

    async fn resolve_and_check(&self, _request: &NotarisationRequest) -> Result<(), NotaryError> {
        Ok(())
    }
}
