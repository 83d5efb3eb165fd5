//! Outbound policies: the honest default and the faulty behaviours used to
//! exercise the protocol's fault tolerance.

use crate::messages::{ProtocolMessage, ReplicaId, SeqNumber, SignedMessage};
use crate::ports::OutboundPolicy;
use shared_crypto::KeyPair;
use std::collections::BTreeSet;
use tracing::error;

/// Sends everything unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct HonestPolicy;

impl OutboundPolicy for HonestPolicy {
    fn outbound(
        &self,
        _to: ReplicaId,
        message: SignedMessage,
        _signer: &KeyPair,
    ) -> Option<SignedMessage> {
        Some(message)
    }
}

/// Sends nothing to the listed replicas, or to anyone when the list is empty.
#[derive(Debug, Default, Clone)]
pub struct SilentPolicy {
    towards: BTreeSet<ReplicaId>,
}

impl SilentPolicy {
    /// Silent towards every replica.
    pub fn everyone() -> Self {
        Self::default()
    }

    /// Silent towards `replicas` only.
    pub fn towards(replicas: impl IntoIterator<Item = ReplicaId>) -> Self {
        Self {
            towards: replicas.into_iter().collect(),
        }
    }
}

impl OutboundPolicy for SilentPolicy {
    fn outbound(
        &self,
        to: ReplicaId,
        message: SignedMessage,
        _signer: &KeyPair,
    ) -> Option<SignedMessage> {
        if self.towards.is_empty() || self.towards.contains(&to) {
            None
        } else {
            Some(message)
        }
    }
}

/// Tells odd-numbered replicas something different from even-numbered ones.
///
/// Prepare and commit votes sent to odd replicas carry a corrupted digest;
/// pre-prepares sent to them carry a different payload with a matching
/// digest. Replies are corrupted for everyone. Altered messages are re-signed
/// with the replica's own key, so they pass signature checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct EquivocatingPolicy;

impl OutboundPolicy for EquivocatingPolicy {
    fn outbound(
        &self,
        to: ReplicaId,
        message: SignedMessage,
        signer: &KeyPair,
    ) -> Option<SignedMessage> {
        let lie_to = to % 2 == 1;
        let body = match message.body.clone() {
            ProtocolMessage::PrePrepare(mut pre_prepare) if lie_to => {
                if let Some(request) = pre_prepare.request.as_mut() {
                    request.payload.push(0xFF);
                    pre_prepare.digest = request.digest();
                }
                ProtocolMessage::PrePrepare(pre_prepare)
            }
            ProtocolMessage::Prepare(mut vote) if lie_to => {
                vote.digest[0] ^= 0xFF;
                ProtocolMessage::Prepare(vote)
            }
            ProtocolMessage::Commit(mut vote) if lie_to => {
                vote.digest[0] ^= 0xFF;
                ProtocolMessage::Commit(vote)
            }
            ProtocolMessage::Reply(mut reply) => {
                reply.result = b"forged".to_vec();
                ProtocolMessage::Reply(reply)
            }
            _ => return Some(message),
        };
        resign(message, body, signer)
    }
}

/// Shifts the timestamp of the request in pre-prepares sent to odd-numbered
/// replicas by `skew` seconds.
///
/// With `keep_digest` the original digest stays in place; otherwise it is
/// recomputed so each lie is consistent on its own.
#[derive(Debug, Clone, Copy)]
pub struct RestampingPolicy {
    pub skew: u64,
    pub keep_digest: bool,
}

impl OutboundPolicy for RestampingPolicy {
    fn outbound(
        &self,
        to: ReplicaId,
        message: SignedMessage,
        signer: &KeyPair,
    ) -> Option<SignedMessage> {
        let ProtocolMessage::PrePrepare(mut pre_prepare) = message.body.clone() else {
            return Some(message);
        };
        let Some(request) = pre_prepare.request.as_mut().filter(|_| to % 2 == 1) else {
            return Some(message);
        };
        request.timestamp = request.timestamp.wrapping_add(self.skew);
        if !self.keep_digest {
            pre_prepare.digest = request.digest();
        }
        resign(message, ProtocolMessage::PrePrepare(pre_prepare), signer)
    }
}

/// Sends every pre-prepare with sequence number `seq`.
#[derive(Debug, Clone, Copy)]
pub struct RenumberingPolicy {
    pub seq: SeqNumber,
}

impl OutboundPolicy for RenumberingPolicy {
    fn outbound(
        &self,
        _to: ReplicaId,
        message: SignedMessage,
        signer: &KeyPair,
    ) -> Option<SignedMessage> {
        let ProtocolMessage::PrePrepare(mut pre_prepare) = message.body.clone() else {
            return Some(message);
        };
        pre_prepare.seq = self.seq;
        resign(message, ProtocolMessage::PrePrepare(pre_prepare), signer)
    }
}

/// Sign `body` as the original sender, falling back to the untouched message.
fn resign(
    original: SignedMessage,
    body: ProtocolMessage,
    signer: &KeyPair,
) -> Option<SignedMessage> {
    match SignedMessage::sign(original.from, body, signer) {
        Ok(forged) => Some(forged),
        Err(e) => {
            error!(error = %e, "Faulty policy failed to re-sign");
            Some(original)
        }
    }
}
