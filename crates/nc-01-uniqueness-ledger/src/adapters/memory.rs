//! # In-Memory Uniqueness Ledger
//!
//! `BTreeMap` behind a `parking_lot::RwLock`. Reads share the lock; a commit
//! holds the write lock while it plans and applies, which makes it atomic.

use crate::domain::{
    plan_commit, records_digest, CommitOutcome, CommitRecord, LedgerError, LedgerResult,
};
use crate::ports::UniquenessLedger;
use parking_lot::RwLock;
use shared_crypto::Digest;
use shared_types::{ConflictSet, StateRef, TransactionId};
use std::collections::BTreeMap;
use tracing::debug;

/// Volatile ledger for tests and single-process nodes.
#[derive(Debug, Default)]
pub struct InMemoryUniquenessLedger {
    records: RwLock<BTreeMap<StateRef, CommitRecord>>,
}

impl InMemoryUniquenessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record, in `StateRef` order.
    pub fn snapshot(&self) -> Vec<CommitRecord> {
        self.records.read().values().copied().collect()
    }
}

impl UniquenessLedger for InMemoryUniquenessLedger {
    fn try_commit(
        &self,
        batch: &[(StateRef, TransactionId)],
        committed_at: u64,
    ) -> LedgerResult<CommitOutcome> {
        let mut records = self.records.write();
        let plan = plan_commit(batch, committed_at, |s| {
            Ok(records.get(s).map(|r| r.consuming_tx))
        })?;

        for record in &plan.new_records {
            records.insert(record.state_ref, *record);
        }

        let outcome = plan.outcome();
        debug!(
            recorded = outcome.recorded,
            replayed = outcome.already_committed,
            total = records.len(),
            "Batch committed"
        );
        Ok(outcome)
    }

    fn conflicts(&self, batch: &[(StateRef, TransactionId)]) -> LedgerResult<ConflictSet> {
        let records = self.records.read();
        match plan_commit(batch, 0, |s| Ok(records.get(s).map(|r| r.consuming_tx))) {
            Ok(_) => Ok(ConflictSet::new()),
            Err(LedgerError::Conflict(conflicts)) => Ok(conflicts),
            Err(other) => Err(other),
        }
    }

    fn get(&self, state: &StateRef) -> LedgerResult<Option<CommitRecord>> {
        Ok(self.records.read().get(state).copied())
    }

    fn len(&self) -> LedgerResult<usize> {
        Ok(self.records.read().len())
    }

    fn state_digest(&self) -> LedgerResult<Digest> {
        Ok(records_digest(self.records.read().values()))
    }
}
