//! # Local Cluster
//!
//! A replicated notary hosted in one process: one uniqueness ledger and one
//! broadcast replica per member, connected by the in-process network.

use crate::adapters::{LedgerStateMachine, ReplicatedClusterBackend};
use crate::domain::{ClusterConfig, ConsensusConfigError};
use nc_01_uniqueness_ledger::{InMemoryUniquenessLedger, UniquenessLedger};
use nc_02_atomic_broadcast::{
    BroadcastConfig, ClusterMember, FaultModel, LocalBroadcastCluster, OutboundPolicy, ReplicaId,
};
use shared_crypto::{derive_seed, KeyPair};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

const REPLICA_KEY_CONTEXT: &str = "notary.cluster.replica-key.v1";

/// Deterministic signing key for the replica at `address`.
///
/// The key follows from the address alone, so anyone who knows the cluster
/// layout can sign as any replica. Only suitable for development and
/// in-process test clusters.
pub fn replica_keypair(address: &str) -> KeyPair {
    KeyPair::from_seed(derive_seed(REPLICA_KEY_CONTEXT, address.as_bytes()))
}

pub struct LocalCluster {
    broadcast: LocalBroadcastCluster,
    ledgers: Vec<Arc<dyn UniquenessLedger>>,
}

impl LocalCluster {
    pub fn builder(addresses: Vec<String>) -> LocalClusterBuilder {
        LocalClusterBuilder {
            addresses,
            fault_model: FaultModel::Byzantine,
            broadcast: BroadcastConfig::default(),
            ledgers: BTreeMap::new(),
            policies: BTreeMap::new(),
        }
    }

    /// Start the cluster described by `config`. The local replica persists to
    /// `local_ledger`; the others get in-memory ledgers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        config: &ClusterConfig,
        local_ledger: Arc<dyn UniquenessLedger>,
    ) -> Result<Self, ConsensusConfigError> {
        let local = config.local_replica()?;
        warn!(
            replica = local,
            "Replica keys are derived from cluster addresses; development only"
        );
        Self::builder(config.cluster_addresses.clone())
            .fault_model(config.fault_model())
            .broadcast_config(config.broadcast_config())
            .ledger(local, local_ledger)
            .start()
    }

    /// Backend submitting through `replica`.
    pub fn backend(&self, replica: ReplicaId) -> Option<ReplicatedClusterBackend> {
        self.broadcast
            .handle(replica)
            .cloned()
            .map(ReplicatedClusterBackend::new)
    }

    pub fn ledger(&self, replica: ReplicaId) -> Option<&Arc<dyn UniquenessLedger>> {
        self.ledgers.get(replica as usize)
    }

    pub fn ledgers(&self) -> &[Arc<dyn UniquenessLedger>] {
        &self.ledgers
    }

    pub fn broadcast(&self) -> &LocalBroadcastCluster {
        &self.broadcast
    }

    pub fn size(&self) -> usize {
        self.ledgers.len()
    }
}

pub struct LocalClusterBuilder {
    addresses: Vec<String>,
    fault_model: FaultModel,
    broadcast: BroadcastConfig,
    ledgers: BTreeMap<ReplicaId, Arc<dyn UniquenessLedger>>,
    policies: BTreeMap<ReplicaId, Arc<dyn OutboundPolicy>>,
}

impl LocalClusterBuilder {
    pub fn fault_model(mut self, fault_model: FaultModel) -> Self {
        self.fault_model = fault_model;
        self
    }

    pub fn broadcast_config(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = config;
        self
    }

    /// Use `ledger` for `replica` instead of a fresh in-memory ledger.
    pub fn ledger(mut self, replica: ReplicaId, ledger: Arc<dyn UniquenessLedger>) -> Self {
        self.ledgers.insert(replica, ledger);
        self
    }

    /// Make `replica` misbehave through `policy`.
    pub fn faulty(mut self, replica: ReplicaId, policy: Arc<dyn OutboundPolicy>) -> Self {
        self.policies.insert(replica, policy);
        self
    }

    pub fn start(mut self) -> Result<LocalCluster, ConsensusConfigError> {
        if self.addresses.is_empty() {
            return Err(ConsensusConfigError::EmptyCluster);
        }

        let mut ledgers: Vec<Arc<dyn UniquenessLedger>> = Vec::with_capacity(self.addresses.len());
        let mut members = Vec::with_capacity(self.addresses.len());
        for (id, address) in self.addresses.iter().enumerate() {
            let id = id as ReplicaId;
            let ledger = self
                .ledgers
                .remove(&id)
                .unwrap_or_else(|| Arc::new(InMemoryUniquenessLedger::new()));
            let app = LedgerStateMachine::new(id, Arc::clone(&ledger));

            let mut member = ClusterMember::honest(replica_keypair(address), Box::new(app));
            if let Some(policy) = self.policies.remove(&id) {
                member = member.with_policy(policy);
            }
            members.push(member);
            ledgers.push(ledger);
        }

        let broadcast = LocalBroadcastCluster::spawn(members, self.fault_model, &self.broadcast)
            .map_err(|e| ConsensusConfigError::Startup(e.to_string()))?;

        info!(
            replicas = ledgers.len(),
            quorum = broadcast.membership().quorum(),
            fault_model = ?self.fault_model,
            "Local notary cluster started"
        );
        Ok(LocalCluster { broadcast, ledgers })
    }
}
