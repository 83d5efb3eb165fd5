//! Error types for the broadcast layer.

use crate::messages::ReplicaId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("Invalid membership: {0}")]
    InvalidMembership(String),

    #[error("Replica {0} is not a cluster member")]
    UnknownReplica(ReplicaId),

    #[error("Signing key does not match the membership key of replica {0}")]
    KeyMismatch(ReplicaId),

    #[error("No decision within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("Replica task has stopped")]
    Stopped,
}

pub type BroadcastResult<T> = Result<T, BroadcastError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("No route to replica {0}")]
    UnknownDestination(ReplicaId),

    #[error("Replica {0} inbox is closed")]
    Closed(ReplicaId),
}
