//! # Error Types
//!
//! The notary error taxonomy observed by requesting parties.

use crate::entities::{Party, StateRef, TimeWindow, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Inputs already consumed, each mapped to the transaction that consumed it.
pub type ConflictSet = BTreeMap<StateRef, TransactionId>;

/// The reason a notarisation request was refused.
///
/// Exactly one variant is produced per failed request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum NotaryError {
    /// Contract verification or dependency resolution failed.
    #[error("Transaction invalid: {0}")]
    TransactionInvalid(String),

    /// One or more inputs were consumed by other transactions.
    #[error(
        "Input states of transaction {tx_id} have already been consumed: {}",
        format_conflicts(.consumed)
    )]
    Conflict {
        tx_id: TransactionId,
        consumed: ConflictSet,
    },

    /// The transaction's time window does not contain the notary's clock.
    #[error("Time window {window} does not contain current time {current_time}")]
    TimeWindowInvalid { window: TimeWindow, current_time: u64 },

    /// The transaction names a different notary.
    #[error("Wrong notary: expected {expected}, transaction names {actual}")]
    WrongNotary { expected: Party, actual: Party },

    /// Party signatures are missing or do not verify.
    #[error("Signatures invalid: {0}")]
    SignaturesInvalid(String),

    /// Any other failure, including an unavailable consensus cluster.
    #[error("Notarisation failed: {0}")]
    General(String),
}

impl NotaryError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NotaryError::TransactionInvalid(_) => "transaction_invalid",
            NotaryError::Conflict { .. } => "conflict",
            NotaryError::TimeWindowInvalid { .. } => "time_window_invalid",
            NotaryError::WrongNotary { .. } => "wrong_notary",
            NotaryError::SignaturesInvalid(_) => "signatures_invalid",
            NotaryError::General(_) => "general",
        }
    }
}

fn format_conflicts(consumed: &ConflictSet) -> String {
    consumed
        .iter()
        .map(|(state, by)| format!("{state} -> {by}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while handling session envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Message version not supported.
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    /// A response arrived for a different flow.
    #[error("Correlation mismatch: expected {expected}, received {received}")]
    CorrelationMismatch { expected: String, received: String },

    /// The counterparty sent a message that does not fit the protocol step.
    #[error("Unexpected message: {0}")]
    Unexpected(String),
}
