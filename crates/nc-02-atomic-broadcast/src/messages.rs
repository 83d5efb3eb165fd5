//! # Protocol Messages
//!
//! Every message travels as a [`SignedMessage`]: the sender id, the body and
//! an Ed25519 signature over a domain-separated digest of both. Receivers
//! verify against the fixed membership before acting.
//!
//! Prepared certificates, checkpoint certificates and view changes embed the
//! original signed votes so any replica can check them independently of who
//! forwarded them.

use crate::config::Membership;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::{
    digest, digest_many, digest_of, verify_signature, CryptoError, Digest, KeyPair,
};
use shared_types::short_hex;
use std::collections::BTreeSet;
use std::fmt;

pub type ReplicaId = u32;
pub type ViewNumber = u64;
pub type SeqNumber = u64;

/// Digest assigned to null requests that fill gaps after a view change.
pub const NULL_DIGEST: Digest = [0u8; 32];

const SIGNING_DOMAIN: &str = "notary.bft.message.v1";

const REQUEST_DOMAIN: &[u8] = b"notary.bft.request.v1";

/// An opaque client payload together with the origin's clock reading.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub payload: Vec<u8>,
    /// Unix seconds at the origin; handed to the application on delivery.
    pub timestamp: u64,
}

impl Request {
    /// Identity of the request: the digest of the payload alone.
    ///
    /// A payload re-submitted with a later timestamp maps onto the same key,
    /// which indexes the reply cache and the outstanding requests.
    pub fn key(&self) -> Digest {
        digest(&self.payload)
    }

    /// Digest that replicas agree on when ordering: covers the timestamp as
    /// well as the payload, since both reach the application.
    pub fn digest(&self) -> Digest {
        digest_many(&[REQUEST_DOMAIN, &self.timestamp.to_be_bytes(), &self.payload])
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request({}, {} bytes)",
            short_hex(&self.digest()),
            self.payload.len()
        )
    }
}

/// Sequence assignment by the primary of `view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrePrepare {
    pub view: ViewNumber,
    pub seq: SeqNumber,
    pub digest: Digest,
    /// `None` for a null request.
    pub request: Option<Request>,
}

impl PrePrepare {
    /// The digest agrees with the carried request.
    pub fn is_well_formed(&self) -> bool {
        digest_matches(&self.digest, self.request.as_ref())
    }
}

/// A prepare or commit vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub view: ViewNumber,
    pub seq: SeqNumber,
    pub digest: Digest,
}

/// The outcome of applying a delivered request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub seq: SeqNumber,
    /// [`Request::key`] of the delivered request.
    pub key: Digest,
    pub result: Vec<u8>,
}

/// Proof that a quorum prepared `digest` at `(view, seq)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCertificate {
    pub view: ViewNumber,
    pub seq: SeqNumber,
    pub digest: Digest,
    pub request: Option<Request>,
    /// Signed `Prepare` votes from distinct replicas.
    pub prepares: Vec<SignedMessage>,
}

impl PreparedCertificate {
    /// Check the request, the votes and their signatures.
    pub fn is_valid(&self, membership: &Membership) -> bool {
        if !digest_matches(&self.digest, self.request.as_ref()) {
            return false;
        }
        if self.prepares.len() > membership.size() {
            return false;
        }
        let mut voters = BTreeSet::new();
        for prepare in &self.prepares {
            let ProtocolMessage::Prepare(vote) = &prepare.body else {
                return false;
            };
            if vote.view != self.view || vote.seq != self.seq || vote.digest != self.digest {
                return false;
            }
            if !prepare.verify(membership) {
                return false;
            }
            voters.insert(prepare.from);
        }
        voters.len() >= membership.quorum()
    }
}

/// Proof that a quorum reached the same log digest at `seq`.
///
/// Sequence numbers up to a stable checkpoint never need to be agreed on
/// again, so the log below it can be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCertificate {
    pub seq: SeqNumber,
    pub digest: Digest,
    /// Signed `Checkpoint` votes from distinct replicas.
    pub checkpoints: Vec<SignedMessage>,
}

impl CheckpointCertificate {
    /// The empty log every replica starts from.
    pub fn genesis() -> Self {
        Self {
            seq: 0,
            digest: NULL_DIGEST,
            checkpoints: Vec::new(),
        }
    }

    pub fn is_valid(&self, membership: &Membership) -> bool {
        if self.seq == 0 {
            return self.digest == NULL_DIGEST && self.checkpoints.is_empty();
        }
        if self.checkpoints.len() > membership.size() {
            return false;
        }
        let mut voters = BTreeSet::new();
        for checkpoint in &self.checkpoints {
            let ProtocolMessage::Checkpoint { seq, digest } = &checkpoint.body else {
                return false;
            };
            if *seq != self.seq || *digest != self.digest || !checkpoint.verify(membership) {
                return false;
            }
            voters.insert(checkpoint.from);
        }
        voters.len() >= membership.quorum()
    }
}

/// Message bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    Request(Request),
    PrePrepare(PrePrepare),
    Prepare(Vote),
    Commit(Vote),
    Reply(Reply),
    /// Log digest after delivering `seq`.
    Checkpoint {
        seq: SeqNumber,
        digest: Digest,
    },
    ViewChange {
        new_view: ViewNumber,
        /// Latest stable checkpoint known to the sender.
        stable: CheckpointCertificate,
        /// Certificates above `stable`, in ascending sequence order.
        prepared: Vec<PreparedCertificate>,
    },
    NewView {
        view: ViewNumber,
        /// Signed `ViewChange` messages from a quorum.
        view_changes: Vec<SignedMessage>,
    },
}

impl ProtocolMessage {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolMessage::Request(_) => "request",
            ProtocolMessage::PrePrepare(_) => "pre_prepare",
            ProtocolMessage::Prepare(_) => "prepare",
            ProtocolMessage::Commit(_) => "commit",
            ProtocolMessage::Reply(_) => "reply",
            ProtocolMessage::Checkpoint { .. } => "checkpoint",
            ProtocolMessage::ViewChange { .. } => "view_change",
            ProtocolMessage::NewView { .. } => "new_view",
        }
    }
}

/// A message body signed by its sender.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub from: ReplicaId,
    pub body: ProtocolMessage,
    #[serde_as(as = "Bytes")]
    pub signature: [u8; 64],
}

impl SignedMessage {
    pub fn sign(
        from: ReplicaId,
        body: ProtocolMessage,
        key: &KeyPair,
    ) -> Result<Self, CryptoError> {
        let signing_digest = signing_digest(from, &body)?;
        Ok(Self {
            from,
            body,
            signature: key.sign(&signing_digest),
        })
    }

    /// True if `from` is a member and the signature is its own.
    pub fn verify(&self, membership: &Membership) -> bool {
        let Some(key) = membership.key(self.from) else {
            return false;
        };
        match signing_digest(self.from, &self.body) {
            Ok(d) => verify_signature(key, &d, &self.signature).is_ok(),
            Err(_) => false,
        }
    }
}

fn signing_digest(from: ReplicaId, body: &ProtocolMessage) -> Result<Digest, CryptoError> {
    digest_of(&(SIGNING_DOMAIN, from, body))
}

fn digest_matches(claimed: &Digest, request: Option<&Request>) -> bool {
    match request {
        Some(request) => request.digest() == *claimed,
        None => *claimed == NULL_DIGEST,
    }
}
