//! Cluster membership, quorum arithmetic and timing configuration.

use crate::error::{BroadcastError, BroadcastResult};
use crate::messages::{ReplicaId, SeqNumber, ViewNumber};
use shared_crypto::signatures::PublicKeyBytes;
use std::collections::BTreeSet;
use std::time::Duration;

/// Failure assumption the quorums are sized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultModel {
    /// Up to `f` replicas may behave arbitrarily; `n >= 3f + 1`.
    Byzantine,
    /// Up to `f` replicas may stop; `n >= 2f + 1`.
    Crash,
}

/// Fixed cluster membership. Replica `i` signs with `keys[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    keys: Vec<PublicKeyBytes>,
    fault_model: FaultModel,
}

impl Membership {
    pub fn new(keys: Vec<PublicKeyBytes>, fault_model: FaultModel) -> BroadcastResult<Self> {
        if keys.is_empty() {
            return Err(BroadcastError::InvalidMembership(
                "cluster has no members".into(),
            ));
        }
        let distinct: BTreeSet<_> = keys.iter().collect();
        if distinct.len() != keys.len() {
            return Err(BroadcastError::InvalidMembership(
                "replica keys must be distinct".into(),
            ));
        }
        Ok(Self { keys, fault_model })
    }

    /// Number of replicas.
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn fault_model(&self) -> FaultModel {
        self.fault_model
    }

    /// Maximum number of faulty replicas tolerated.
    pub fn max_faulty(&self) -> usize {
        let n = self.size();
        match self.fault_model {
            FaultModel::Byzantine => (n - 1) / 3,
            FaultModel::Crash => (n - 1) / 2,
        }
    }

    /// Votes needed to prepare, commit and decide.
    ///
    /// Any two quorums intersect in at least one correct replica.
    pub fn quorum(&self) -> usize {
        let n = self.size();
        match self.fault_model {
            FaultModel::Byzantine => (n + self.max_faulty()) / 2 + 1,
            FaultModel::Crash => n / 2 + 1,
        }
    }

    /// Votes that include at least one correct replica (`f + 1`).
    pub fn weak_quorum(&self) -> usize {
        self.max_faulty() + 1
    }

    /// Primary of `view`.
    pub fn primary(&self, view: ViewNumber) -> ReplicaId {
        (view % self.size() as u64) as ReplicaId
    }

    pub fn key(&self, replica: ReplicaId) -> Option<&PublicKeyBytes> {
        self.keys.get(replica as usize)
    }

    pub fn contains(&self, replica: ReplicaId) -> bool {
        (replica as usize) < self.size()
    }

    /// Every replica id, ascending.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> + '_ {
        (0..self.keys.len()).map(|i| i as ReplicaId)
    }
}

/// Timing and diagnostics for one replica.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// How long `submit` waits for a decision.
    pub request_timeout: Duration,
    /// How long a request may stay undelivered before the primary is
    /// suspected.
    pub view_change_timeout: Duration,
    /// Log every protocol message.
    pub debug: bool,
    /// Delay proposals by a random amount to shake out ordering races.
    pub expose_races: bool,
    /// Replicas exchange log digests every this many sequence numbers.
    pub checkpoint_interval: SeqNumber,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            view_change_timeout: Duration::from_secs(2),
            debug: false,
            expose_races: false,
            checkpoint_interval: 128,
        }
    }
}

impl BroadcastConfig {
    /// Short timeouts for in-process clusters.
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            view_change_timeout: Duration::from_millis(300),
            debug: false,
            expose_races: false,
            checkpoint_interval: 16,
        }
    }

    /// Sequence numbers a replica accepts above its low watermark.
    ///
    /// Two checkpoint intervals, so the primary can keep proposing while the
    /// latest checkpoint is still being collected.
    pub fn log_window(&self) -> SeqNumber {
        self.checkpoint_interval.max(1).saturating_mul(2)
    }

    /// Interval at which the runner checks timers.
    pub fn tick_interval(&self) -> Duration {
        (self.view_change_timeout / 4).max(Duration::from_millis(5))
    }
}
