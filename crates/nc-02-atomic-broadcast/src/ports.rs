//! # Ports
//!
//! - [`StateMachine`]: the replicated application, fed delivered requests.
//! - [`ClusterTransport`]: point-to-point delivery between replicas.
//! - [`OutboundPolicy`]: last hook before a message leaves a replica; the
//!   honest policy passes everything through, tests install faulty ones.

use crate::error::TransportError;
use crate::messages::{ReplicaId, SeqNumber, SignedMessage};
use async_trait::async_trait;
use shared_crypto::{Digest, KeyPair};

/// A request delivered in total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub seq: SeqNumber,
    pub digest: Digest,
    /// Unix seconds stamped by the submitting replica.
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

/// Deterministic application replicated by the cluster.
///
/// Correct replicas call `apply` with the same deliveries in the same order,
/// so implementations must not depend on local state outside themselves.
pub trait StateMachine: Send + 'static {
    /// Apply one delivery and return the reply sent to the submitter.
    fn apply(&mut self, delivery: &Delivery) -> Vec<u8>;
}

/// Sends signed messages to other replicas.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Replica this transport sends on behalf of.
    fn local_id(&self) -> ReplicaId;

    async fn send(&self, to: ReplicaId, message: SignedMessage) -> Result<(), TransportError>;
}

/// Decides what actually leaves the replica for each destination.
pub trait OutboundPolicy: Send + Sync {
    /// Return the message to send to `to`, or `None` to drop it.
    ///
    /// `signer` is the replica's own key, for policies that rewrite bodies.
    fn outbound(
        &self,
        to: ReplicaId,
        message: SignedMessage,
        signer: &KeyPair,
    ) -> Option<SignedMessage>;
}
