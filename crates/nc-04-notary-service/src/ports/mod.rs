//! # Ports
//!
//! Collaborators of the notary service:
//! - [`TransactionVerifier`]: dependency resolution and contract verification
//! - [`KeyService`]: the notary's signing key and signature checks
//! - [`TimeSource`]: the notary's clock
//! - [`UniquenessProvider`]: the consensus backend

use async_trait::async_trait;
use shared_types::{PublicKey, Signature, SignedTransaction, StateRef, TransactionId};
use thiserror::Error;

pub use nc_03_notary_consensus::{FixedTimeSource, SystemTimeSource, TimeSource, UniquenessProvider};

/// A transaction whose dependencies resolved and whose contracts accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub id: TransactionId,
    /// Number of inputs resolved against the dependency chain.
    pub resolved_inputs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// No supplied dependency produced this input.
    #[error("Input {0} does not resolve to a supplied dependency")]
    UnresolvedInput(StateRef),

    /// A contract refused the transaction.
    #[error("Contract verification failed: {0}")]
    ContractRejected(String),

    /// The verifier itself failed.
    #[error("Verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies a transaction against its dependency chain.
#[async_trait]
pub trait TransactionVerifier: Send + Sync {
    async fn verify(
        &self,
        transaction: &SignedTransaction,
        dependencies: &[SignedTransaction],
    ) -> Result<VerifiedTransaction, VerificationError>;
}

/// The notary's key and signature primitives.
pub trait KeyService: Send + Sync {
    /// Key the notary signs with.
    fn public_key(&self) -> PublicKey;

    fn sign(&self, data: &[u8]) -> Signature;

    fn verify_signature(&self, data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool;
}
