//! The replicated application: applies ordered commit commands to a replica's
//! own ledger.

use crate::domain::{CommitCommand, CommitError, CommitVerdict};
use nc_01_uniqueness_ledger::UniquenessLedger;
use nc_02_atomic_broadcast::{Delivery, ReplicaId, StateMachine};
use shared_types::short_hex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LedgerStateMachine {
    replica: ReplicaId,
    ledger: Arc<dyn UniquenessLedger>,
}

impl LedgerStateMachine {
    pub fn new(replica: ReplicaId, ledger: Arc<dyn UniquenessLedger>) -> Self {
        Self { replica, ledger }
    }

    fn verdict(&self, delivery: &Delivery) -> CommitVerdict {
        let command = match CommitCommand::decode(&delivery.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    replica = self.replica,
                    seq = delivery.seq,
                    error = %e,
                    "Undecodable commit command"
                );
                return CommitVerdict::Failed(format!("undecodable command: {e}"));
            }
        };

        // The submitter's timestamp travels with the request, so every
        // replica writes the same record.
        let result = self
            .ledger
            .try_commit(&command.batch(), delivery.timestamp)
            .map_err(CommitError::from);

        match &result {
            Ok(outcome) => debug!(
                replica = self.replica,
                seq = delivery.seq,
                tx_id = %command.tx_id,
                recorded = outcome.recorded,
                "Command applied"
            ),
            Err(e) => debug!(
                replica = self.replica,
                seq = delivery.seq,
                tx_id = %command.tx_id,
                error = %e,
                "Command refused"
            ),
        }
        CommitVerdict::from(result)
    }
}

impl StateMachine for LedgerStateMachine {
    fn apply(&mut self, delivery: &Delivery) -> Vec<u8> {
        let verdict = self.verdict(delivery);
        if let CommitVerdict::Failed(reason) = &verdict {
            warn!(
                replica = self.replica,
                digest = %short_hex(&delivery.digest),
                reason = %reason,
                "Ledger failure while applying command"
            );
        }
        verdict.encode()
    }
}
