//! # Local Broadcast Cluster
//!
//! Runs a whole replica group inside one process over a [`LocalNetwork`].
//! Used by in-process notary clusters and by tests.

use crate::adapters::{HonestPolicy, LocalNetwork};
use crate::config::{BroadcastConfig, FaultModel, Membership};
use crate::error::BroadcastResult;
use crate::messages::ReplicaId;
use crate::ports::{OutboundPolicy, StateMachine};
use crate::replica::Replica;
use crate::runner::{spawn_replica, BroadcastHandle};
use shared_crypto::KeyPair;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// One replica's key, application and outbound behaviour.
pub struct ClusterMember {
    pub keypair: KeyPair,
    pub app: Box<dyn StateMachine>,
    pub policy: Arc<dyn OutboundPolicy>,
}

impl ClusterMember {
    pub fn honest(keypair: KeyPair, app: Box<dyn StateMachine>) -> Self {
        Self {
            keypair,
            app,
            policy: Arc::new(HonestPolicy),
        }
    }

    /// Replace the outbound policy.
    pub fn with_policy(mut self, policy: Arc<dyn OutboundPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// A running in-process cluster. Replica tasks are aborted on drop.
pub struct LocalBroadcastCluster {
    membership: Membership,
    network: Arc<LocalNetwork>,
    handles: Vec<BroadcastHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl LocalBroadcastCluster {
    /// Spawn one replica task per member. Member `i` becomes replica `i`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        members: Vec<ClusterMember>,
        fault_model: FaultModel,
        config: &BroadcastConfig,
    ) -> BroadcastResult<Self> {
        let keys = members.iter().map(|m| m.keypair.public_key()).collect();
        let membership = Membership::new(keys, fault_model)?;
        let (network, inboxes) = LocalNetwork::new(membership.size());

        let mut handles = Vec::with_capacity(members.len());
        let mut tasks = Vec::with_capacity(members.len());
        for ((id, member), inbox) in members.into_iter().enumerate().zip(inboxes) {
            let id = id as ReplicaId;
            let replica = Replica::new(
                id,
                member.keypair.clone(),
                membership.clone(),
                config,
                member.app,
            )?;
            let (handle, task) = spawn_replica(
                replica,
                member.keypair,
                config,
                Arc::new(network.transport(id)),
                inbox,
                member.policy,
            );
            handles.push(handle);
            tasks.push(task);
        }

        info!(
            replicas = membership.size(),
            max_faulty = membership.max_faulty(),
            quorum = membership.quorum(),
            "Local broadcast cluster started"
        );

        Ok(Self {
            membership,
            network,
            handles,
            tasks,
        })
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }

    pub fn handle(&self, replica: ReplicaId) -> Option<&BroadcastHandle> {
        self.handles.get(replica as usize)
    }

    pub fn handles(&self) -> &[BroadcastHandle] {
        &self.handles
    }
}

impl Drop for LocalBroadcastCluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EquivocatingPolicy, RenumberingPolicy, RestampingPolicy, SilentPolicy};
    use crate::error::BroadcastError;
    use crate::messages::{Request, SeqNumber};
    use crate::ports::Delivery;
    use parking_lot::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<Delivery>>>;

    struct Recorder(Log);

    impl StateMachine for Recorder {
        fn apply(&mut self, delivery: &Delivery) -> Vec<u8> {
            self.0.lock().push(delivery.clone());
            delivery.seq.to_le_bytes().to_vec()
        }
    }

    fn spawn(members: Vec<ClusterMember>) -> LocalBroadcastCluster {
        let config = BroadcastConfig::for_testing();
        LocalBroadcastCluster::spawn(members, FaultModel::Byzantine, &config).unwrap()
    }

    fn payloads(log: &Log) -> Vec<(SeqNumber, Vec<u8>)> {
        log.lock().iter().map(|d| (d.seq, d.payload.clone())).collect()
    }

    /// Wait until the given logs hold identical deliveries covering `payloads`.
    async fn settle(logs: &[Log], payloads: &[&[u8]]) -> Vec<Delivery> {
        for _ in 0..200 {
            let reference = logs[0].lock().clone();
            let complete = payloads
                .iter()
                .all(|p| reference.iter().any(|d| d.payload.as_slice() == *p));
            if complete && logs[1..].iter().all(|log| *log.lock() == reference) {
                return reference;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("correct replicas did not converge");
    }

    fn with_faulty_primary(policy: Arc<dyn OutboundPolicy>) -> (LocalBroadcastCluster, Vec<Log>) {
        let (mut members, logs) = members(4);
        let primary = members.remove(0).with_policy(policy);
        members.insert(0, primary);
        (spawn(members), logs)
    }

    fn members(n: usize) -> (Vec<ClusterMember>, Vec<Log>) {
        (0..n)
            .map(|i| {
                let log: Log = Arc::default();
                let member = ClusterMember::honest(
                    KeyPair::from_seed([i as u8 + 40; 32]),
                    Box::new(Recorder(Arc::clone(&log))),
                );
                (member, log)
            })
            .unzip()
    }

    #[tokio::test]
    async fn test_concurrent_submissions_totally_ordered() {
        let (members, logs) = members(4);
        let cluster = spawn(members);

        let submissions = (0..8u8).map(|i| {
            let handle = cluster.handle((i % 4) as ReplicaId).unwrap().clone();
            async move { handle.submit(vec![i]).await }
        });
        let decisions = futures_join_all(submissions).await;

        let mut seqs: Vec<SeqNumber> = decisions.into_iter().map(|d| d.unwrap().seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=8).collect::<Vec<_>>());

        // Replies only need a quorum; give stragglers a moment to deliver.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let reference = payloads(&logs[0]);
        assert_eq!(reference.len(), 8);
        for log in &logs[1..] {
            assert_eq!(payloads(log), reference);
        }
    }

    #[tokio::test]
    async fn test_equivocating_backup_cannot_split_correct_replicas() {
        let (mut members, logs) = members(4);
        let faulty = members.pop().unwrap().with_policy(Arc::new(EquivocatingPolicy));
        members.push(faulty);

        let cluster = spawn(members);

        for i in 0..3u8 {
            let decision = cluster.handle(0).unwrap().submit(vec![i]).await.unwrap();
            assert_eq!(decision.result, decision.seq.to_le_bytes().to_vec());
        }

        let reference = settle(&logs[..3], &[&[0], &[1], &[2]]).await;
        assert_eq!(reference.len(), 3);
    }

    #[tokio::test]
    async fn test_equivocating_primary_cannot_split_correct_replicas() {
        let (cluster, logs) = with_faulty_primary(Arc::new(EquivocatingPolicy));

        for i in 0..3u8 {
            let decision = cluster.handle(2).unwrap().submit(vec![i]).await.unwrap();
            assert_eq!(decision.result, decision.seq.to_le_bytes().to_vec());
        }

        settle(&logs[1..], &[&[0], &[1], &[2]]).await;
        let status = cluster.handle(2).unwrap().status().await.unwrap();
        assert!(status.view >= 1, "the lying primary was replaced");
    }

    #[tokio::test]
    async fn test_restamping_primary_cannot_split_timestamps() {
        for keep_digest in [false, true] {
            let policy = RestampingPolicy { skew: 3_600, keep_digest };
            let (cluster, logs) = with_faulty_primary(Arc::new(policy));

            for i in 0..2u8 {
                cluster.handle(1 + i as ReplicaId).unwrap().submit(vec![i]).await.unwrap();
            }

            // Same payload, same timestamp, same digest at every correct replica.
            let reference = settle(&logs[1..], &[&[0], &[1]]).await;
            for delivery in &reference {
                let request = Request {
                    payload: delivery.payload.clone(),
                    timestamp: delivery.timestamp,
                };
                assert_eq!(delivery.digest, request.digest());
            }
        }
    }

    #[tokio::test]
    async fn test_renumbering_primary_replaced_without_harm() {
        let policy = RenumberingPolicy { seq: u64::MAX - 1 };
        let (cluster, logs) = with_faulty_primary(Arc::new(policy));

        let decision = cluster.handle(3).unwrap().submit(b"tx".to_vec()).await.unwrap();
        assert_eq!(decision.seq, 1);

        let reference = settle(&logs[1..], &[b"tx"]).await;
        assert_eq!(reference.len(), 1);
        for replica in 1..4 {
            let status = cluster.handle(replica).unwrap().status().await.unwrap();
            assert!(status.view >= 1);
            assert_eq!(status.last_delivered, 1);
        }
    }

    #[tokio::test]
    async fn test_silent_primary_triggers_view_change() {
        let (mut members, logs) = members(4);
        let primary = members.remove(0).with_policy(Arc::new(SilentPolicy::everyone()));
        members.insert(0, primary);

        let cluster = spawn(members);

        let decision = cluster.handle(2).unwrap().submit(b"tx".to_vec()).await.unwrap();
        assert_eq!(decision.seq, 1);

        let status = cluster.handle(2).unwrap().status().await.unwrap();
        assert!(status.view >= 1);
        assert_eq!(payloads(&logs[2]), vec![(1, b"tx".to_vec())]);
    }

    #[tokio::test]
    async fn test_timeout_without_quorum() {
        let (members, _logs) = members(4);
        let cluster = spawn(members);
        cluster.network().isolate(2);
        cluster.network().isolate(3);

        let err = cluster
            .handle(1)
            .unwrap()
            .submit_within(b"tx".to_vec(), Duration::from_millis(200))
            .await
            .unwrap_err();

        assert_eq!(err, BroadcastError::Timeout { waited_ms: 200 });
    }

    #[tokio::test]
    async fn test_partitioned_replica_does_not_block_cluster() {
        let (members, logs) = members(4);
        let cluster = spawn(members);
        cluster.network().isolate(3);

        cluster.handle(1).unwrap().submit(b"a".to_vec()).await.unwrap();

        assert!(logs[3].lock().is_empty());
        assert!(cluster.network().messages_dropped() > 0);
    }

    async fn futures_join_all<F, T>(futures: impl IntoIterator<Item = F>) -> Vec<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }
}
