//! Ledger port implemented by storage adapters.

use crate::domain::{CommitOutcome, CommitRecord, LedgerResult};
use shared_crypto::Digest;
use shared_types::{ConflictSet, StateRef, TransactionId};

/// Storage of commit records with atomic, conflict-checked batch writes.
///
/// Implementations must make `try_commit` atomic with respect to concurrent
/// calls and must have persisted new records before it returns.
pub trait UniquenessLedger: Send + Sync {
    /// Record every `(state, tx)` in `batch`, or nothing.
    ///
    /// Fails with `LedgerError::Conflict` listing every input already consumed
    /// by another transaction.
    fn try_commit(
        &self,
        batch: &[(StateRef, TransactionId)],
        committed_at: u64,
    ) -> LedgerResult<CommitOutcome>;

    /// The conflicts `try_commit` would report for `batch`, without writing.
    fn conflicts(&self, batch: &[(StateRef, TransactionId)]) -> LedgerResult<ConflictSet>;

    /// Record for one state, if consumed.
    fn get(&self, state: &StateRef) -> LedgerResult<Option<CommitRecord>>;

    /// Number of consumed states.
    fn len(&self) -> LedgerResult<usize>;

    fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Digest over all records in `StateRef` order, for comparing replicas.
    fn state_digest(&self) -> LedgerResult<Digest>;
}
