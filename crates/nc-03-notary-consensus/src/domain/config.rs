//! Consensus mode selection and replicated-cluster configuration.

use crate::domain::errors::ConsensusConfigError;
use nc_02_atomic_broadcast::{BroadcastConfig, FaultModel, ReplicaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Which backend commits batches to the uniqueness ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusMode {
    /// One node owns the ledger.
    #[default]
    SingleAuthority,
    /// The ledger is replicated across a fixed cluster.
    ReplicatedCluster(ClusterConfig),
}

impl ConsensusMode {
    pub fn validate(&self) -> Result<(), ConsensusConfigError> {
        match self {
            ConsensusMode::SingleAuthority => Ok(()),
            ConsensusMode::ReplicatedCluster(cluster) => cluster.validate(),
        }
    }
}

/// Fixed membership and timing of a replicated notary cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// This node's position in `cluster_addresses`.
    pub replica_id: i32,
    /// One address per replica; the index is the replica id.
    pub cluster_addresses: Vec<String>,
    /// Byzantine quorums when set, crash-fault quorums otherwise.
    pub byzantine_fault_tolerance: bool,
    /// Trace every protocol message.
    pub debug: bool,
    /// Randomly delay proposals. Test clusters only.
    pub expose_races: bool,
    pub request_timeout_ms: u64,
    pub view_change_timeout_ms: u64,
    /// Replicas exchange log checkpoints every this many batches.
    pub checkpoint_interval: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replica_id: 0,
            cluster_addresses: Vec::new(),
            byzantine_fault_tolerance: true,
            debug: false,
            expose_races: false,
            request_timeout_ms: 10_000,
            view_change_timeout_ms: 2_000,
            checkpoint_interval: 128,
        }
    }
}

impl ClusterConfig {
    /// Check the configuration before anything is started.
    pub fn validate(&self) -> Result<(), ConsensusConfigError> {
        if self.replica_id < 0 {
            return Err(ConsensusConfigError::NegativeReplicaId(self.replica_id));
        }
        if self.cluster_addresses.is_empty() {
            return Err(ConsensusConfigError::EmptyCluster);
        }
        if self.replica_id as usize >= self.cluster_size() {
            return Err(ConsensusConfigError::ReplicaIdOutOfRange {
                replica_id: self.replica_id,
                cluster_size: self.cluster_size(),
            });
        }

        let mut seen = BTreeSet::new();
        for (position, address) in self.cluster_addresses.iter().enumerate() {
            if address.trim().is_empty() {
                return Err(ConsensusConfigError::BlankAddress(position));
            }
            if !seen.insert(address.as_str()) {
                return Err(ConsensusConfigError::DuplicateAddress(address.clone()));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(ConsensusConfigError::ZeroTimeout {
                name: "request_timeout_ms",
            });
        }
        if self.view_change_timeout_ms == 0 {
            return Err(ConsensusConfigError::ZeroTimeout {
                name: "view_change_timeout_ms",
            });
        }
        if self.checkpoint_interval == 0 {
            return Err(ConsensusConfigError::ZeroCheckpointInterval);
        }
        Ok(())
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_addresses.len()
    }

    /// The validated replica id.
    pub fn local_replica(&self) -> Result<ReplicaId, ConsensusConfigError> {
        self.validate()?;
        Ok(self.replica_id as ReplicaId)
    }

    pub fn fault_model(&self) -> FaultModel {
        if self.byzantine_fault_tolerance {
            FaultModel::Byzantine
        } else {
            FaultModel::Crash
        }
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            view_change_timeout: Duration::from_millis(self.view_change_timeout_ms),
            debug: self.debug,
            expose_races: self.expose_races,
            checkpoint_interval: self.checkpoint_interval,
        }
    }
}
