//! # Faulty Replicas
//!
//! A notary service backed by an in-process cluster in which one replica
//! lies, stays silent or is cut off. Correct replicas must keep identical
//! ledgers and requesters must keep getting correct answers.

use super::support::{party_key, settle, spend, state, TestNotary, NOW};
use nc_01_uniqueness_ledger::{CommitRecord, UniquenessLedger};
use nc_02_atomic_broadcast::adapters::{
    EquivocatingPolicy, RenumberingPolicy, RestampingPolicy, SilentPolicy,
};
use nc_02_atomic_broadcast::{BroadcastConfig, FaultModel, OutboundPolicy};
use nc_03_notary_consensus::{FixedTimeSource, LocalCluster};
use shared_types::{ConflictSet, NotaryError, StateRef};
use std::sync::Arc;

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("notary-{i}.cluster:10000")).collect()
}

/// Service submitting through `entry`, writing to that replica's ledger.
fn notary_via(cluster: &LocalCluster, entry: u32) -> TestNotary {
    TestNotary::serving(
        Arc::new(cluster.backend(entry).unwrap()),
        Arc::clone(cluster.ledger(entry).unwrap()),
        Arc::new(FixedTimeSource::new(NOW)),
        false,
    )
}

/// Notarise two spends through replica 2 while the primary misbehaves, then
/// check the correct replicas hold the same full records.
async fn notarise_under_faulty_primary(policy: Arc<dyn OutboundPolicy>, base: u8) {
    let cluster = LocalCluster::builder(addresses(4))
        .broadcast_config(BroadcastConfig::for_testing())
        .faulty(0, policy)
        .start()
        .unwrap();
    let notary = notary_via(&cluster, 2);
    let alice = party_key(1);
    let client = notary.client("Alice");

    let inputs = vec![state(base, 0), state(base, 1), state(base + 1, 0)];
    let t1 = spend(&notary.identity, inputs[..2].to_vec(), &[&alice], 1);
    let t2 = spend(&notary.identity, inputs[2..].to_vec(), &[&alice], 2);
    client.notarize(t1.clone(), vec![]).await.unwrap();
    client.notarize(t2.clone(), vec![]).await.unwrap();

    let correct = &cluster.ledgers()[1..];
    settle(correct, inputs.len()).await;
    assert_identical_records(correct, &inputs);
    assert_eq!(correct[0].get(&inputs[0]).unwrap().unwrap().consuming_tx, t1.id());
    assert_eq!(correct[0].get(&inputs[2]).unwrap().unwrap().consuming_tx, t2.id());

    // Correct replicas keep serving after the primary is replaced.
    let t3 = spend(&notary.identity, vec![state(base + 2, 0)], &[&alice], 3);
    client.notarize(t3, vec![]).await.unwrap();
    settle(correct, inputs.len() + 1).await;
}

fn assert_identical_records(ledgers: &[Arc<dyn UniquenessLedger>], inputs: &[StateRef]) {
    let reference: Vec<Option<CommitRecord>> =
        inputs.iter().map(|input| ledgers[0].get(input).unwrap()).collect();
    assert!(reference.iter().all(Option::is_some));
    for ledger in &ledgers[1..] {
        let records: Vec<Option<CommitRecord>> =
            inputs.iter().map(|input| ledger.get(input).unwrap()).collect();
        assert_eq!(records, reference);
        assert_eq!(ledger.state_digest().unwrap(), ledgers[0].state_digest().unwrap());
    }
}

#[tokio::test]
async fn test_primary_altering_payloads_cannot_split_records() {
    notarise_under_faulty_primary(Arc::new(EquivocatingPolicy), 40).await;
}

#[tokio::test]
async fn test_primary_restamping_requests_cannot_split_commit_times() {
    let policy = RestampingPolicy { skew: 3_600, keep_digest: false };
    notarise_under_faulty_primary(Arc::new(policy), 44).await;
}

#[tokio::test]
async fn test_primary_restamping_under_old_digest_cannot_split_commit_times() {
    let policy = RestampingPolicy { skew: 3_600, keep_digest: true };
    notarise_under_faulty_primary(Arc::new(policy), 48).await;
}

#[tokio::test]
async fn test_primary_numbering_beyond_window_is_replaced() {
    let policy = RenumberingPolicy { seq: u64::MAX - 1 };
    notarise_under_faulty_primary(Arc::new(policy), 52).await;
}

#[tokio::test]
async fn test_equivocating_replica_cannot_split_correct_ledgers() {
    let cluster = LocalCluster::builder(addresses(4))
        .broadcast_config(BroadcastConfig::for_testing())
        .faulty(3, Arc::new(EquivocatingPolicy))
        .start()
        .unwrap();
    let notary = notary_via(&cluster, 0);
    let alice = party_key(1);
    let client = notary.client("Alice");

    let t1 = spend(&notary.identity, vec![state(30, 0), state(30, 1)], &[&alice], 1);
    let t2 = spend(&notary.identity, vec![state(31, 0)], &[&alice], 2);
    client.notarize(t1.clone(), vec![]).await.unwrap();
    client.notarize(t2, vec![]).await.unwrap();

    let t3 = spend(&notary.identity, vec![state(30, 1), state(32, 0)], &[&alice], 3);
    let err = client.notarize(t3.clone(), vec![]).await.unwrap_err();
    assert_eq!(
        err,
        NotaryError::Conflict {
            tx_id: t3.id(),
            consumed: ConflictSet::from([(state(30, 1), t1.id())]),
        }
    );

    let correct = &cluster.ledgers()[..3];
    settle(correct, 3).await;
    let reference = correct[0].state_digest().unwrap();
    for ledger in &correct[1..] {
        assert_eq!(ledger.len().unwrap(), 3);
        assert_eq!(ledger.state_digest().unwrap(), reference);
    }
}

#[tokio::test]
async fn test_silent_primary_replaced_and_requests_still_notarised() {
    let cluster = LocalCluster::builder(addresses(4))
        .broadcast_config(BroadcastConfig::for_testing())
        .faulty(0, Arc::new(SilentPolicy::everyone()))
        .start()
        .unwrap();
    let notary = notary_via(&cluster, 2);
    let alice = party_key(1);
    let input = state(33, 0);

    let tx = spend(&notary.identity, vec![input], &[&alice], 1);
    notary.client("Alice").notarize(tx.clone(), vec![]).await.unwrap();

    let status = cluster.broadcast().handle(2).unwrap().status().await.unwrap();
    assert!(status.view >= 1, "view changed away from the silent primary");

    let correct = &cluster.ledgers()[1..];
    settle(correct, 1).await;
    for ledger in correct {
        assert_eq!(ledger.get(&input).unwrap().unwrap().consuming_tx, tx.id());
    }
}

#[tokio::test]
async fn test_crash_model_progresses_without_isolated_replica() {
    let cluster = LocalCluster::builder(addresses(3))
        .fault_model(FaultModel::Crash)
        .broadcast_config(BroadcastConfig::for_testing())
        .start()
        .unwrap();
    cluster.broadcast().network().isolate(2);
    let notary = notary_via(&cluster, 0);
    let alice = party_key(1);
    let client = notary.client("Alice");

    let t1 = spend(&notary.identity, vec![state(34, 0)], &[&alice], 1);
    let t2 = spend(&notary.identity, vec![state(34, 0)], &[&alice], 2);
    client.notarize(t1, vec![]).await.unwrap();
    assert_eq!(client.notarize(t2, vec![]).await.unwrap_err().kind(), "conflict");

    settle(&cluster.ledgers()[..2], 1).await;
    assert_eq!(
        cluster.ledgers()[0].state_digest().unwrap(),
        cluster.ledgers()[1].state_digest().unwrap()
    );
    assert!(cluster.ledgers()[2].is_empty().unwrap());
}
