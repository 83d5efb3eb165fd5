//! View change validation and log reconstruction.
//!
//! Every replica rebuilds the new view's log from the same quorum of signed
//! view-change messages, so the new primary never has to be trusted with
//! the carried-over assignments.

use crate::config::Membership;
use crate::messages::{
    CheckpointCertificate, PreparedCertificate, ProtocolMessage, ReplicaId, Request, SeqNumber,
    SignedMessage, ViewNumber, NULL_DIGEST,
};
use shared_crypto::Digest;
use std::collections::{BTreeMap, BTreeSet};

/// An assignment carried into the new view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CarriedEntry {
    pub seq: SeqNumber,
    pub digest: Digest,
    pub request: Option<Request>,
}

/// The starting point of a new view.
#[derive(Debug, Clone)]
pub(super) struct CarriedLog {
    /// Highest stable checkpoint among the view changes.
    pub stable: CheckpointCertificate,
    /// One entry per sequence number above `stable`, ascending.
    pub entries: Vec<CarriedEntry>,
}

/// True if `message` is a correctly signed view change to `view` whose
/// checkpoint and certificates all check out.
///
/// Certificates must sit in the sender's log window above its stable
/// checkpoint, in strictly ascending order, so a view change never carries
/// more than `window` of them.
pub(super) fn is_valid_view_change(
    message: &SignedMessage,
    view: ViewNumber,
    membership: &Membership,
    window: SeqNumber,
) -> bool {
    let ProtocolMessage::ViewChange { new_view, stable, prepared } = &message.body else {
        return false;
    };
    if *new_view != view || !message.verify(membership) || !stable.is_valid(membership) {
        return false;
    }

    let high = stable.seq.saturating_add(window);
    let mut previous = stable.seq;
    for cert in prepared {
        if cert.seq <= previous || cert.seq > high || cert.view >= view {
            return false;
        }
        if !cert.is_valid(membership) {
            return false;
        }
        previous = cert.seq;
    }
    true
}

/// Check that `view_changes` holds valid view changes to `view`, one from
/// each of a quorum of distinct replicas.
pub(super) fn is_valid_new_view(
    view: ViewNumber,
    view_changes: &[SignedMessage],
    membership: &Membership,
    window: SeqNumber,
) -> bool {
    if view_changes.len() > membership.size() {
        return false;
    }
    let mut senders: BTreeSet<ReplicaId> = BTreeSet::new();
    for message in view_changes {
        if !senders.insert(message.from) {
            return false;
        }
        if !is_valid_view_change(message, view, membership, window) {
            return false;
        }
    }
    senders.len() >= membership.quorum()
}

/// Rebuild the log for a new view from validated view changes.
///
/// The log starts above the highest stable checkpoint reported. For each
/// sequence number up to the highest one certified above it, the
/// certificate from the highest view wins; gaps become null requests.
pub(super) fn carried_log(view_changes: &[SignedMessage]) -> CarriedLog {
    let mut stable = CheckpointCertificate::genesis();
    for message in view_changes {
        if let ProtocolMessage::ViewChange { stable: reported, .. } = &message.body {
            if reported.seq > stable.seq {
                stable = reported.clone();
            }
        }
    }

    let mut best: BTreeMap<SeqNumber, &PreparedCertificate> = BTreeMap::new();
    for message in view_changes {
        let ProtocolMessage::ViewChange { prepared, .. } = &message.body else {
            continue;
        };
        for cert in prepared.iter().filter(|cert| cert.seq > stable.seq) {
            match best.get(&cert.seq) {
                Some(current) if current.view >= cert.view => {}
                _ => {
                    best.insert(cert.seq, cert);
                }
            }
        }
    }

    let highest = best.keys().next_back().copied().unwrap_or(stable.seq);
    let entries = (stable.seq + 1..=highest)
        .map(|seq| match best.get(&seq) {
            Some(cert) => CarriedEntry {
                seq,
                digest: cert.digest,
                request: cert.request.clone(),
            },
            None => CarriedEntry {
                seq,
                digest: NULL_DIGEST,
                request: None,
            },
        })
        .collect();

    CarriedLog { stable, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultModel;
    use crate::messages::Vote;
    use shared_crypto::KeyPair;

    const WINDOW: SeqNumber = 8;

    fn cluster() -> (Vec<KeyPair>, Membership) {
        let keys: Vec<KeyPair> = (0..4).map(|i| KeyPair::from_seed([i + 40; 32])).collect();
        let membership = Membership::new(
            keys.iter().map(|k| k.public_key()).collect(),
            FaultModel::Byzantine,
        )
        .unwrap();
        (keys, membership)
    }

    fn certificate(keys: &[KeyPair], view: ViewNumber, seq: SeqNumber) -> PreparedCertificate {
        let request = Request { payload: vec![seq as u8], timestamp: 7 };
        let vote = Vote { view, seq, digest: request.digest() };
        PreparedCertificate {
            view,
            seq,
            digest: vote.digest,
            request: Some(request),
            prepares: (0..3)
                .map(|i| {
                    SignedMessage::sign(i, ProtocolMessage::Prepare(vote), &keys[i as usize])
                        .unwrap()
                })
                .collect(),
        }
    }

    fn stable_at(keys: &[KeyPair], seq: SeqNumber) -> CheckpointCertificate {
        let body = ProtocolMessage::Checkpoint { seq, digest: [seq as u8; 32] };
        CheckpointCertificate {
            seq,
            digest: [seq as u8; 32],
            checkpoints: (0..3)
                .map(|i| SignedMessage::sign(i, body.clone(), &keys[i as usize]).unwrap())
                .collect(),
        }
    }

    fn view_change(
        keys: &[KeyPair],
        from: ReplicaId,
        stable: CheckpointCertificate,
        prepared: Vec<PreparedCertificate>,
    ) -> SignedMessage {
        let body = ProtocolMessage::ViewChange { new_view: 1, stable, prepared };
        SignedMessage::sign(from, body, &keys[from as usize]).unwrap()
    }

    #[test]
    fn test_certificates_must_fit_the_window() {
        let (keys, membership) = cluster();
        let genesis = CheckpointCertificate::genesis();

        let inside = view_change(&keys, 1, genesis.clone(), vec![certificate(&keys, 0, WINDOW)]);
        assert!(is_valid_view_change(&inside, 1, &membership, WINDOW));

        let too_far = vec![certificate(&keys, 0, WINDOW + 1)];
        let beyond = view_change(&keys, 1, genesis.clone(), too_far);
        assert!(!is_valid_view_change(&beyond, 1, &membership, WINDOW));

        let unordered = view_change(
            &keys,
            1,
            genesis,
            vec![certificate(&keys, 0, 3), certificate(&keys, 0, 2)],
        );
        assert!(!is_valid_view_change(&unordered, 1, &membership, WINDOW));

        // Below the sender's own stable checkpoint.
        let stale = view_change(&keys, 1, stable_at(&keys, 4), vec![certificate(&keys, 0, 4)]);
        assert!(!is_valid_view_change(&stale, 1, &membership, WINDOW));
    }

    #[test]
    fn test_new_view_rejects_repeated_sender() {
        let (keys, membership) = cluster();
        let vc = view_change(&keys, 2, CheckpointCertificate::genesis(), vec![]);
        let repeated = vec![vc.clone(), vc.clone(), vc];

        assert!(!is_valid_new_view(1, &repeated, &membership, WINDOW));
    }

    #[test]
    fn test_carried_log_starts_at_highest_stable_checkpoint() {
        let (keys, _) = cluster();
        let view_changes = vec![
            view_change(
                &keys,
                0,
                CheckpointCertificate::genesis(),
                vec![certificate(&keys, 0, 2), certificate(&keys, 0, 5)],
            ),
            view_change(&keys, 1, stable_at(&keys, 4), vec![certificate(&keys, 0, 7)]),
            view_change(&keys, 2, stable_at(&keys, 4), vec![]),
        ];

        let log = carried_log(&view_changes);

        assert_eq!(log.stable.seq, 4);
        let seqs: Vec<SeqNumber> = log.entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![5, 6, 7]);
        assert!(log.entries[0].request.is_some());
        assert_eq!(log.entries[1].digest, NULL_DIGEST);
    }
}
