//! # Notarisation Outcomes
//!
//! Requesting flow → notary service → single-authority backend → ledger,
//! checked from the requester's side and against the ledger afterwards.

use super::support::{issuance, party_key, sign, spend, spend_within, state, TestNotary, NOW};
use shared_crypto::is_valid_signature;
use shared_types::{ConflictSet, NotaryError, Party, StateRef, TimeWindow};

#[tokio::test]
async fn test_double_spend_names_first_consumer_and_replay_is_stable() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    let input = state(1, 0);
    let t1 = spend(&notary.identity, vec![input], &[&alice], 1);
    let t2 = spend(&notary.identity, vec![input], &[&alice], 2);
    let client = notary.client("Alice");

    let notarised = client.notarize(t1.clone(), vec![]).await.unwrap();
    let notary_sig = notarised.sigs.last().unwrap().clone();
    assert_eq!(notary_sig.by, notary.key.public_key());
    assert!(is_valid_signature(&notary_sig.by, t1.id().as_bytes(), &notary_sig.bytes));

    let err = client.notarize(t2.clone(), vec![]).await.unwrap_err();
    assert_eq!(
        err,
        NotaryError::Conflict {
            tx_id: t2.id(),
            consumed: ConflictSet::from([(input, t1.id())]),
        }
    );

    // Same transaction again: same answer, same signature bytes.
    let again = client.notarize(t1.clone(), vec![]).await.unwrap();
    assert_eq!(again.sigs.last(), Some(&notary_sig));

    let record = notary.ledger.get(&input).unwrap().unwrap();
    assert_eq!(record.consuming_tx, t1.id());
    assert_eq!(record.committed_at, NOW);
    assert_eq!(notary.ledger.len().unwrap(), 1);
}

#[tokio::test]
async fn test_conflict_lists_exactly_the_consumed_inputs() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    let (a, b, c, d) = (state(2, 0), state(2, 1), state(3, 0), state(4, 7));
    let client = notary.client("Alice");

    let t1 = spend(&notary.identity, vec![a, b, c], &[&alice], 1);
    client.notarize(t1.clone(), vec![]).await.unwrap();

    let t2 = spend(&notary.identity, vec![a, b, c, d], &[&alice], 2);
    let err = client.notarize(t2.clone(), vec![]).await.unwrap_err();

    let NotaryError::Conflict { tx_id, consumed } = err else {
        panic!("expected conflict, got {err}");
    };
    assert_eq!(tx_id, t2.id());
    assert_eq!(consumed, ConflictSet::from([(a, t1.id()), (b, t1.id()), (c, t1.id())]));
    assert!(notary.ledger.get(&d).unwrap().is_none(), "nothing of a refused batch is written");
    assert_eq!(notary.ledger.len().unwrap(), 3);
}

#[tokio::test]
async fn test_expired_time_window_rejected_until_clock_allows() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    let window = TimeWindow::between(NOW - 100, NOW - 10);
    let tx = spend_within(&notary.identity, vec![state(5, 0)], &alice, window);
    let client = notary.client("Alice");

    let err = client.notarize(tx.clone(), vec![]).await.unwrap_err();
    assert_eq!(
        err,
        NotaryError::TimeWindowInvalid {
            window,
            current_time: NOW,
        }
    );
    assert!(notary.ledger.is_empty().unwrap());

    notary.clock.set(NOW - 50);
    client.notarize(tx, vec![]).await.unwrap();
    assert_eq!(notary.ledger.len().unwrap(), 1);
}

#[tokio::test]
async fn test_wrong_notary_refused_before_anything_is_committed() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    let elsewhere = Party::new("O=Other Notary, L=Paris, C=FR", party_key(9).public_key());

    // Bad signatures too: the notary check comes first.
    let mut tx = spend(&elsewhere, vec![state(6, 0)], &[&alice], 1);
    tx.sigs[0].bytes[0] ^= 0xFF;

    let err = notary.client("Alice").notarize(tx, vec![]).await.unwrap_err();

    assert_eq!(
        err,
        NotaryError::WrongNotary {
            expected: notary.identity.clone(),
            actual: elsewhere,
        }
    );
    assert!(notary.ledger.is_empty().unwrap());
}

#[tokio::test]
async fn test_missing_or_forged_signature_never_consumes_inputs() {
    let notary = TestNotary::single_authority(false);
    let (alice, bob) = (party_key(1), party_key(2));
    let input = state(7, 0);
    let client = notary.client("Alice");

    // Bob is required but never signed.
    let mut unsigned = spend(&notary.identity, vec![input], &[&alice, &bob], 1);
    unsigned.sigs.truncate(1);
    let err = client.notarize(unsigned, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), "signatures_invalid");

    let mut forged = spend(&notary.identity, vec![input], &[&alice], 2);
    forged.sigs[0].bytes[5] ^= 0x01;
    let err = client.notarize(forged, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), "signatures_invalid");

    assert!(notary.ledger.get(&input).unwrap().is_none());

    // The input is still spendable by a properly signed transaction.
    let honest = spend(&notary.identity, vec![input], &[&alice, &bob], 3);
    client.notarize(honest, vec![]).await.unwrap();
}

#[tokio::test]
async fn test_validating_notary_resolves_dependencies() {
    let notary = TestNotary::single_authority(true);
    let alice = party_key(1);
    let bonds = issuance(&notary.identity, 2);
    let input = StateRef::new(bonds.id(), 1);
    let tx = spend(&notary.identity, vec![input], &[&alice], 1);
    let client = notary.client("Alice");

    let err = client.notarize(tx.clone(), vec![]).await.unwrap_err();
    assert_eq!(err.kind(), "transaction_invalid");
    assert!(notary.ledger.is_empty().unwrap());

    // Output index past the dependency's outputs.
    let overreach = spend(&notary.identity, vec![StateRef::new(bonds.id(), 2)], &[&alice], 2);
    let err = client.notarize(overreach, vec![bonds.clone()]).await.unwrap_err();
    assert_eq!(err.kind(), "transaction_invalid");

    client.notarize(tx, vec![bonds]).await.unwrap();
    assert!(notary.ledger.get(&input).unwrap().is_some());
}

#[tokio::test]
async fn test_non_validating_notary_ignores_contract_content() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    let mut tx = spend(&notary.identity, vec![state(8, 0)], &[&alice], 1).tx;
    tx.outputs = vec![b"not a state the notary could parse".to_vec()];
    tx.commands.clear();

    notary
        .client("Alice")
        .notarize(sign(tx, &[&alice]), vec![])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_every_session_served_before_shutdown() {
    let notary = TestNotary::single_authority(false);
    let alice = party_key(1);
    {
        let client = notary.client("Alice");
        for n in 0..3 {
            let tx = spend(&notary.identity, vec![state(10 + n, 0)], &[&alice], n);
            client.notarize(tx, vec![]).await.unwrap();
        }
    }

    assert_eq!(notary.stop().await, 3);
}
