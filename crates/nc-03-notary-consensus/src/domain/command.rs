//! The payload ordered by the replicated backend and each replica's verdict.

use crate::domain::errors::{CommitError, CommitResult};
use nc_01_uniqueness_ledger::CommitOutcome;
use serde::{Deserialize, Serialize};
use shared_types::{ConflictSet, StateRef, TransactionId, TransactionParts};

/// A batch to commit, as carried through atomic broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCommand {
    pub tx_id: TransactionId,
    pub inputs: Vec<StateRef>,
}

impl CommitCommand {
    pub fn from_parts(parts: &TransactionParts) -> Self {
        Self {
            tx_id: parts.id,
            inputs: parts.inputs.clone(),
        }
    }

    pub fn batch(&self) -> Vec<(StateRef, TransactionId)> {
        self.inputs.iter().map(|input| (*input, self.tx_id)).collect()
    }

    pub fn encode(&self) -> CommitResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CommitError::General(format!("encode command: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// A replica's outcome for one delivered [`CommitCommand`].
///
/// Correct replicas hold identical ledgers, so they produce identical
/// verdicts for the same sequence of commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitVerdict {
    Committed {
        recorded: usize,
        already_committed: usize,
    },
    Conflict(ConflictSet),
    Failed(String),
}

impl CommitVerdict {
    pub fn encode(&self) -> Vec<u8> {
        // Plain enum of sizes, maps and strings.
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> CommitResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| CommitError::General(format!("undecodable cluster verdict: {e}")))
    }

    pub fn into_result(self) -> CommitResult<CommitOutcome> {
        match self {
            CommitVerdict::Committed {
                recorded,
                already_committed,
            } => Ok(CommitOutcome {
                recorded,
                already_committed,
            }),
            CommitVerdict::Conflict(consumed) => Err(CommitError::Conflict(consumed)),
            CommitVerdict::Failed(reason) => Err(CommitError::General(reason)),
        }
    }
}

impl From<CommitResult<CommitOutcome>> for CommitVerdict {
    fn from(result: CommitResult<CommitOutcome>) -> Self {
        match result {
            Ok(outcome) => CommitVerdict::Committed {
                recorded: outcome.recorded,
                already_committed: outcome.already_committed,
            },
            Err(CommitError::Conflict(consumed)) => CommitVerdict::Conflict(consumed),
            Err(other) => CommitVerdict::Failed(other.to_string()),
        }
    }
}
