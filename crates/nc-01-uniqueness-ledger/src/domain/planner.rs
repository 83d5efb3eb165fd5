//! # Commit Planning
//!
//! Decides, from a batch and a lookup into existing records, what a commit
//! would write. Adapters run the planner under their write lock and then
//! persist the plan in one atomic write.
//!
//! ## Rules
//!
//! - An input already consumed by a *different* transaction is a conflict.
//! - An input already consumed by the *same* transaction is accepted and
//!   produces no record.
//! - Duplicate inputs naming the same transaction collapse to one record.
//! - Duplicate inputs naming different transactions conflict; the first
//!   claimant in batch order is reported as the consumer.
//! - Any conflict refuses the entire batch.

use super::{CommitOutcome, CommitRecord, LedgerError, LedgerResult};
use shared_types::{ConflictSet, StateRef, TransactionId};
use std::collections::BTreeMap;

/// Records a commit would write, and how many inputs were replays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitPlan {
    pub new_records: Vec<CommitRecord>,
    pub already_committed: usize,
}

impl CommitPlan {
    pub fn outcome(&self) -> CommitOutcome {
        CommitOutcome {
            recorded: self.new_records.len(),
            already_committed: self.already_committed,
        }
    }
}

/// Plan committing `batch` at `committed_at`.
///
/// `lookup` returns the transaction that already consumed a state, if any.
/// Returns `LedgerError::Conflict` with every colliding input when the batch
/// cannot be committed.
pub fn plan_commit<F>(
    batch: &[(StateRef, TransactionId)],
    committed_at: u64,
    mut lookup: F,
) -> LedgerResult<CommitPlan>
where
    F: FnMut(&StateRef) -> LedgerResult<Option<TransactionId>>,
{
    let mut claimed: BTreeMap<StateRef, TransactionId> = BTreeMap::new();
    let mut conflicts = ConflictSet::new();
    let mut plan = CommitPlan::default();

    for (position, (state, tx)) in batch.iter().enumerate() {
        if let Some(first) = claimed.get(state) {
            if first != tx {
                conflicts.insert(*state, *first);
            }
            continue;
        }
        claimed.insert(*state, *tx);

        match lookup(state)? {
            Some(existing) if existing == *tx => plan.already_committed += 1,
            Some(existing) => {
                conflicts.insert(*state, existing);
            }
            None => plan.new_records.push(CommitRecord {
                state_ref: *state,
                consuming_tx: *tx,
                input_index: position as u32,
                committed_at,
            }),
        }
    }

    if conflicts.is_empty() {
        Ok(plan)
    } else {
        Err(LedgerError::Conflict(conflicts))
    }
}
