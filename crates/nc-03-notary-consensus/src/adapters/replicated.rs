//! # Replicated Cluster Backend
//!
//! Submits commit commands through one replica of an atomic broadcast
//! cluster. Every correct replica applies the command to its own ledger in
//! sequence order; the decision is the outcome a quorum of replicas reported.
//!
//! A proposal that reaches no decision within the cluster timeout is
//! re-proposed once. The re-proposal carries the same payload, so if the first
//! one was in fact ordered it is answered from the replicas' reply caches.

use crate::domain::{CommitCommand, CommitError, CommitResult, CommitVerdict};
use crate::ports::UniquenessProvider;
use async_trait::async_trait;
use nc_01_uniqueness_ledger::CommitOutcome;
use nc_02_atomic_broadcast::{BroadcastError, BroadcastHandle};
use shared_types::TransactionParts;
use tracing::{info, warn};

/// Proposals per commit: the first plus one re-proposal.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Clone)]
pub struct ReplicatedClusterBackend {
    handle: BroadcastHandle,
}

impl ReplicatedClusterBackend {
    pub fn new(handle: BroadcastHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &BroadcastHandle {
        &self.handle
    }
}

#[async_trait]
impl UniquenessProvider for ReplicatedClusterBackend {
    async fn commit(&self, parts: &TransactionParts) -> CommitResult<CommitOutcome> {
        let payload = CommitCommand::from_parts(parts).encode()?;

        let mut attempt = 0;
        let decision = loop {
            attempt += 1;
            match self.handle.submit(payload.clone()).await {
                Ok(decision) => break decision,
                Err(BroadcastError::Timeout { waited_ms }) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        tx_id = %parts.id,
                        replica = self.handle.replica_id(),
                        waited_ms,
                        "No cluster decision; re-proposing"
                    );
                }
                Err(e @ BroadcastError::Timeout { .. }) => {
                    warn!(tx_id = %parts.id, attempts = attempt, "Cluster unavailable");
                    return Err(CommitError::TransientUnavailable {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(CommitError::General(e.to_string())),
            }
        };

        let result = CommitVerdict::decode(&decision.result)?.into_result();
        match &result {
            Ok(outcome) => info!(
                tx_id = %parts.id,
                seq = decision.seq,
                recorded = outcome.recorded,
                "Cluster committed batch"
            ),
            Err(e) => warn!(
                tx_id = %parts.id,
                seq = decision.seq,
                error = %e,
                "Cluster refused batch"
            ),
        }
        result
    }

    fn name(&self) -> &'static str {
        "replicated-cluster"
    }
}
