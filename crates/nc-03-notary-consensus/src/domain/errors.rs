use nc_01_uniqueness_ledger::LedgerError;
use shared_types::{ConflictSet, NotaryError, TransactionId};
use thiserror::Error;

/// Why a consensus backend did not commit a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// Inputs already consumed by other transactions.
    #[error("{} input(s) already consumed", .0.len())]
    Conflict(ConflictSet),

    /// The cluster reached no decision, even after re-proposing.
    #[error("Consensus unavailable after {attempts} attempt(s): {reason}")]
    TransientUnavailable { attempts: u32, reason: String },

    /// Any other backend failure.
    #[error("Commit failed: {0}")]
    General(String),
}

impl CommitError {
    /// The error observed by the requesting party.
    pub fn into_notary_error(self, tx_id: TransactionId) -> NotaryError {
        match self {
            CommitError::Conflict(consumed) => NotaryError::Conflict { tx_id, consumed },
            CommitError::TransientUnavailable { .. } => NotaryError::General(self.to_string()),
            CommitError::General(reason) => NotaryError::General(reason),
        }
    }
}

impl From<LedgerError> for CommitError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict(consumed) => CommitError::Conflict(consumed),
            other => CommitError::General(other.to_string()),
        }
    }
}

pub type CommitResult<T> = Result<T, CommitError>;

/// Invalid consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusConfigError {
    #[error("Replica id {0} is negative")]
    NegativeReplicaId(i32),

    #[error("Replica id {replica_id} is outside a cluster of {cluster_size}")]
    ReplicaIdOutOfRange { replica_id: i32, cluster_size: usize },

    #[error("Cluster has no members")]
    EmptyCluster,

    #[error("Cluster address {0} is listed twice")]
    DuplicateAddress(String),

    #[error("Cluster address at position {0} is blank")]
    BlankAddress(usize),

    #[error("Timeout {name} must be positive")]
    ZeroTimeout { name: &'static str },

    #[error("Checkpoint interval must be positive")]
    ZeroCheckpointInterval,

    #[error("Cluster could not be started: {0}")]
    Startup(String),
}
