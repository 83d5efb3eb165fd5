//! # Single Authority Backend
//!
//! One node owns the ledger. Every commit runs inside one critical section,
//! which is the only synchronisation point between concurrent flows.

use crate::domain::CommitResult;
use crate::ports::{TimeSource, UniquenessProvider};
use async_trait::async_trait;
use nc_01_uniqueness_ledger::{CommitOutcome, UniquenessLedger};
use shared_types::TransactionParts;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct SingleAuthorityBackend {
    ledger: Arc<dyn UniquenessLedger>,
    time_source: Arc<dyn TimeSource>,
    commit_lock: Mutex<()>,
}

impl SingleAuthorityBackend {
    pub fn new(ledger: Arc<dyn UniquenessLedger>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            ledger,
            time_source,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn UniquenessLedger> {
        &self.ledger
    }
}

#[async_trait]
impl UniquenessProvider for SingleAuthorityBackend {
    async fn commit(&self, parts: &TransactionParts) -> CommitResult<CommitOutcome> {
        let batch = parts.commit_batch();

        let guard = self.commit_lock.lock().await;
        let result = self.ledger.try_commit(&batch, self.time_source.now());
        drop(guard);

        match result {
            Ok(outcome) => {
                debug!(
                    tx_id = %parts.id,
                    recorded = outcome.recorded,
                    already_committed = outcome.already_committed,
                    "Batch committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(tx_id = %parts.id, error = %e, "Batch not committed");
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "single-authority"
    }
}
