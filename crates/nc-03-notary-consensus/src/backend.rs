//! Builds the backend selected by [`ConsensusMode`].

use crate::adapters::{ReplicatedClusterBackend, SingleAuthorityBackend};
use crate::domain::{CommitResult, ConsensusConfigError, ConsensusMode};
use crate::local_cluster::LocalCluster;
use crate::ports::{TimeSource, UniquenessProvider};
use async_trait::async_trait;
use nc_01_uniqueness_ledger::{CommitOutcome, UniquenessLedger};
use shared_types::TransactionParts;
use std::sync::Arc;
use tracing::info;

pub enum ConsensusBackend {
    SingleAuthority(SingleAuthorityBackend),
    ReplicatedCluster {
        entry: ReplicatedClusterBackend,
        cluster: LocalCluster,
    },
}

impl ConsensusBackend {
    /// Validate `mode` and start its backend over `ledger`.
    ///
    /// In replicated mode `ledger` belongs to the configured replica and the
    /// rest of the cluster is hosted in this process. Must be called from
    /// within a tokio runtime.
    pub fn start(
        mode: &ConsensusMode,
        ledger: Arc<dyn UniquenessLedger>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, ConsensusConfigError> {
        mode.validate()?;
        let backend = match mode {
            ConsensusMode::SingleAuthority => {
                ConsensusBackend::SingleAuthority(SingleAuthorityBackend::new(ledger, time_source))
            }
            ConsensusMode::ReplicatedCluster(config) => {
                let replica = config.local_replica()?;
                let cluster = LocalCluster::from_config(config, ledger)?;
                let entry = cluster.backend(replica).ok_or_else(|| {
                    ConsensusConfigError::Startup(format!("replica {replica} missing"))
                })?;
                ConsensusBackend::ReplicatedCluster { entry, cluster }
            }
        };
        info!(backend = backend.name(), "Consensus backend ready");
        Ok(backend)
    }

    pub fn cluster(&self) -> Option<&LocalCluster> {
        match self {
            ConsensusBackend::SingleAuthority(_) => None,
            ConsensusBackend::ReplicatedCluster { cluster, .. } => Some(cluster),
        }
    }
}

#[async_trait]
impl UniquenessProvider for ConsensusBackend {
    async fn commit(&self, parts: &TransactionParts) -> CommitResult<CommitOutcome> {
        match self {
            ConsensusBackend::SingleAuthority(backend) => backend.commit(parts).await,
            ConsensusBackend::ReplicatedCluster { entry, .. } => entry.commit(parts).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConsensusBackend::SingleAuthority(backend) => backend.name(),
            ConsensusBackend::ReplicatedCluster { entry, .. } => entry.name(),
        }
    }
}
