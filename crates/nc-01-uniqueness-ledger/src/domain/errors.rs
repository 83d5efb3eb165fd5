use shared_types::ConflictSet;
use thiserror::Error;

/// Errors from uniqueness ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Inputs already consumed by other transactions. Nothing was written.
    #[error("{} input(s) already consumed", .0.len())]
    Conflict(ConflictSet),

    /// The storage engine failed.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// A stored record could not be decoded.
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
