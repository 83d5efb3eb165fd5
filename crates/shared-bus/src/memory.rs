//! # In-Memory Sessions
//!
//! Two halves of a session joined by a pair of bounded tokio channels.

use crate::session::{FlowSession, NotaryEnvelope, SessionError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// One half of an in-process session.
#[derive(Debug)]
pub struct InMemorySession {
    id: Uuid,
    local: String,
    counterparty: String,
    outbound: mpsc::Sender<NotaryEnvelope>,
    inbound: mpsc::Receiver<NotaryEnvelope>,
}

/// Create both halves of a session between `initiator` and `responder`.
///
/// The first half belongs to `initiator`, the second to `responder`.
#[must_use]
pub fn session_pair(initiator: &str, responder: &str) -> (InMemorySession, InMemorySession) {
    session_pair_with_capacity(initiator, responder, DEFAULT_CHANNEL_CAPACITY)
}

/// [`session_pair`] with an explicit per-direction buffer.
#[must_use]
pub fn session_pair_with_capacity(
    initiator: &str,
    responder: &str,
    capacity: usize,
) -> (InMemorySession, InMemorySession) {
    let id = Uuid::new_v4();
    let (to_responder, from_initiator) = mpsc::channel(capacity.max(1));
    let (to_initiator, from_responder) = mpsc::channel(capacity.max(1));

    debug!(session = %id, initiator, responder, "Session opened");

    let initiator_half = InMemorySession {
        id,
        local: initiator.to_string(),
        counterparty: responder.to_string(),
        outbound: to_responder,
        inbound: from_responder,
    };
    let responder_half = InMemorySession {
        id,
        local: responder.to_string(),
        counterparty: initiator.to_string(),
        outbound: to_initiator,
        inbound: from_initiator,
    };
    (initiator_half, responder_half)
}

impl InMemorySession {
    /// Name of the party holding this half.
    pub fn local_party(&self) -> &str {
        &self.local
    }
}

#[async_trait]
impl FlowSession for InMemorySession {
    fn session_id(&self) -> Uuid {
        self.id
    }

    fn counterparty(&self) -> &str {
        &self.counterparty
    }

    async fn send(&mut self, message: NotaryEnvelope) -> Result<(), SessionError> {
        trace!(
            session = %self.id,
            from = %self.local,
            to = %self.counterparty,
            kind = message.payload.label(),
            "Sending"
        );
        self.outbound
            .send(message)
            .await
            .map_err(|_| SessionError::Closed(self.id))
    }

    async fn receive(&mut self) -> Result<NotaryEnvelope, SessionError> {
        self.inbound.recv().await.ok_or(SessionError::Closed(self.id))
    }
}
