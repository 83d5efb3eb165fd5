//! # Competing Spenders
//!
//! Many requesters race to consume the same input. Exactly one wins, and
//! every loser is told who did.

use super::support::{party_key, settle, spend, state, TestNotary};
use nc_02_atomic_broadcast::BroadcastConfig;
use nc_03_notary_consensus::{CommitError, LocalCluster, UniquenessProvider};
use shared_types::{ConflictSet, NotaryError, Party, TransactionParts};

const RACERS: u8 = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_authority_commits_contested_input_once() {
    let notary = TestNotary::single_authority(false);
    let shared = state(20, 0);

    let racers: Vec<_> = (0..RACERS)
        .map(|n| {
            let signer = party_key(100 + n);
            // Each racer also consumes an input of its own.
            let tx = spend(&notary.identity, vec![shared, state(21, n as u32)], &[&signer], n);
            let client = notary.client(&format!("Racer {n}"));
            tokio::spawn(async move { (tx.id(), client.notarize(tx, vec![]).await) })
        })
        .collect();

    let mut winners = Vec::new();
    let mut losers = Vec::new();
    for racer in racers {
        let (id, outcome) = racer.await.unwrap();
        match outcome {
            Ok(_) => winners.push(id),
            Err(e) => losers.push((id, e)),
        }
    }

    assert_eq!(winners.len(), 1);
    let winner = winners[0];
    for (id, err) in losers {
        assert_eq!(
            err,
            NotaryError::Conflict {
                tx_id: id,
                consumed: ConflictSet::from([(shared, winner)]),
            }
        );
    }
    assert_eq!(notary.ledger.get(&shared).unwrap().unwrap().consuming_tx, winner);
    assert_eq!(notary.ledger.len().unwrap(), 2, "only the winner's batch is written");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cluster_commits_contested_input_once_across_entry_replicas() {
    let cluster = LocalCluster::builder((0..4).map(|i| format!("notary-{i}:10000")).collect())
        .broadcast_config(BroadcastConfig::for_testing())
        .start()
        .unwrap();
    let notary = Party::new("O=Cluster Notary, L=Oslo, C=NO", party_key(50).public_key());
    let shared = state(22, 0);

    let racers: Vec<_> = (0..8u8)
        .map(|n| {
            let tx = spend(&notary, vec![shared], &[&party_key(60 + n)], n);
            let parts = TransactionParts::from_transaction(&tx.tx);
            let backend = cluster.backend((n % 4) as u32).unwrap();
            tokio::spawn(async move { (parts.id, backend.commit(&parts).await) })
        })
        .collect();

    let mut winners = Vec::new();
    let mut conflicts = Vec::new();
    for racer in racers {
        let (id, outcome) = racer.await.unwrap();
        match outcome {
            Ok(_) => winners.push(id),
            Err(CommitError::Conflict(consumed)) => conflicts.push(consumed),
            Err(other) => panic!("unexpected failure for {id}: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts.len(), 7);
    for consumed in conflicts {
        assert_eq!(consumed, ConflictSet::from([(shared, winners[0])]));
    }

    settle(cluster.ledgers(), 1).await;
    let digests: Vec<_> = cluster.ledgers().iter().map(|l| l.state_digest().unwrap()).collect();
    assert!(digests.windows(2).all(|pair| pair[0] == pair[1]));
}
