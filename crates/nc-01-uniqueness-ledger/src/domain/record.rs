use serde::{Deserialize, Serialize};
use shared_crypto::{Digest, DigestWriter};
use shared_types::{StateRef, TransactionId};

/// Durable proof that `state_ref` was consumed by `consuming_tx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub state_ref: StateRef,
    pub consuming_tx: TransactionId,
    /// Position of the state among the consuming transaction's inputs.
    pub input_index: u32,
    /// Unix seconds supplied by the committing backend.
    pub committed_at: u64,
}

/// Result of a successful `try_commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitOutcome {
    /// Records written by this call.
    pub recorded: usize,
    /// Inputs that were already consumed by the same transaction.
    pub already_committed: usize,
}

impl CommitOutcome {
    /// True when the whole batch had been committed before.
    pub fn is_replay(&self) -> bool {
        self.recorded == 0 && self.already_committed > 0
    }
}

/// Deterministic digest over full records in `StateRef` order.
///
/// Replicas take the commit time from the ordered request, so the timestamp
/// is covered too: two ledgers agree only if every record matches.
pub fn records_digest<'a>(records: impl IntoIterator<Item = &'a CommitRecord>) -> Digest {
    let mut writer = DigestWriter::new();
    for record in records {
        // Fixed-size fields; encoding into a hasher cannot fail.
        let _ = bincode::serialize_into(
            &mut writer,
            &(
                record.state_ref,
                record.consuming_tx,
                record.input_index,
                record.committed_at,
            ),
        );
    }
    writer.finalize()
}
