use crate::messages::{
    CheckpointCertificate, ProtocolMessage, ReplicaId, SeqNumber, SignedMessage,
};
use shared_crypto::{digest_many, Digest};
use std::collections::BTreeMap;

/// Chain the log digest over one more delivered sequence number.
///
/// Null deliveries extend the chain with the null digest, so replicas that
/// delivered the same log hold the same value at every sequence number.
pub(super) fn extend_log_digest(log: &Digest, seq: SeqNumber, delivered: &Digest) -> Digest {
    digest_many(&[log, &seq.to_be_bytes(), delivered])
}

/// The most recent checkpoint vote from each replica.
///
/// One vote per sender keeps the table bounded by the cluster size whatever
/// sequence numbers a faulty replica claims.
#[derive(Debug, Default)]
pub(super) struct CheckpointVotes {
    latest: BTreeMap<ReplicaId, SignedMessage>,
}

impl CheckpointVotes {
    /// Record `message` unless its sender already voted for a later checkpoint.
    pub fn record(&mut self, message: SignedMessage) -> bool {
        let Some((seq, _)) = vote_of(&message) else {
            return false;
        };
        if let Some((previous, _)) = self.latest.get(&message.from).and_then(vote_of) {
            if previous >= seq {
                return false;
            }
        }
        self.latest.insert(message.from, message);
        true
    }

    /// A certificate for `(seq, digest)` once `quorum` replicas agree on it.
    pub fn certificate(
        &self,
        seq: SeqNumber,
        digest: Digest,
        quorum: usize,
    ) -> Option<CheckpointCertificate> {
        let matching: Vec<SignedMessage> = self
            .latest
            .values()
            .filter(|m| vote_of(m) == Some((seq, digest)))
            .take(quorum)
            .cloned()
            .collect();
        (matching.len() >= quorum).then(|| CheckpointCertificate {
            seq,
            digest,
            checkpoints: matching,
        })
    }

    /// Forget votes at or below the stable checkpoint.
    pub fn prune(&mut self, stable: SeqNumber) {
        self.latest
            .retain(|_, m| vote_of(m).map_or(false, |(seq, _)| seq > stable));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.latest.len()
    }
}

fn vote_of(message: &SignedMessage) -> Option<(SeqNumber, Digest)> {
    match &message.body {
        ProtocolMessage::Checkpoint { seq, digest } => Some((*seq, *digest)),
        _ => None,
    }
}
