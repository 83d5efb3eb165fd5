//! # Notarisation Session Payloads
//!
//! A notarisation session carries exactly one request from the requesting
//! party followed by exactly one response from the notary. Both travel inside
//! a [`crate::SessionEnvelope`] sharing one correlation id.

use crate::entities::{SignedTransaction, TransactionId, TransactionSignature};
use crate::errors::NotaryError;
use serde::{Deserialize, Serialize};

/// A request to notarise `transaction`.
///
/// Validating notaries resolve `dependencies` to check contract validity;
/// non-validating notaries ignore them. `tx_id` is the id the requester
/// believes the transaction has; the notary recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisationRequest {
    pub tx_id: TransactionId,
    pub transaction: SignedTransaction,
    pub dependencies: Vec<SignedTransaction>,
}

impl NotarisationRequest {
    pub fn new(transaction: SignedTransaction, dependencies: Vec<SignedTransaction>) -> Self {
        Self {
            tx_id: transaction.id(),
            transaction,
            dependencies,
        }
    }
}

/// The notary's answer to a [`NotarisationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotarisationResponse {
    /// The inputs are now consumed by `tx_id`; `signature` is the notary's
    /// signature over the transaction id.
    Signed {
        tx_id: TransactionId,
        signature: TransactionSignature,
    },
    /// The request was refused.
    Rejected(NotaryError),
}

/// Everything that can travel on a notarisation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotaryMessage {
    Request(NotarisationRequest),
    Response(NotarisationResponse),
}

impl NotaryMessage {
    /// Short label used in logs and protocol errors.
    pub fn label(&self) -> &'static str {
        match self {
            NotaryMessage::Request(_) => "notarisation_request",
            NotaryMessage::Response(NotarisationResponse::Signed { .. }) => "signed_response",
            NotaryMessage::Response(NotarisationResponse::Rejected(_)) => "rejected_response",
        }
    }
}
