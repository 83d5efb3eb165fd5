//! # Flow Session Port
//!
//! The send / receive capability a flow uses to talk to its counterparty.

use async_trait::async_trait;
use shared_types::{NotaryMessage, SessionEnvelope};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Envelope type carried by notarisation sessions.
pub type NotaryEnvelope = SessionEnvelope<NotaryMessage>;

/// Errors from session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The counterparty closed the session.
    #[error("Session {0} closed by counterparty")]
    Closed(Uuid),

    /// No message arrived within the allotted time.
    #[error("Session {session} timed out after {waited_ms}ms")]
    Timeout { session: Uuid, waited_ms: u64 },

    /// The endpoint no longer accepts sessions.
    #[error("Endpoint {0} is not accepting sessions")]
    EndpointClosed(String),
}

/// One side of a two-party session.
///
/// Implementations must deliver messages in the order they were sent.
#[async_trait]
pub trait FlowSession: Send {
    /// Identifier shared by both halves of the session.
    fn session_id(&self) -> Uuid;

    /// Name of the party on the other side.
    fn counterparty(&self) -> &str;

    /// Send a message to the counterparty.
    async fn send(&mut self, message: NotaryEnvelope) -> Result<(), SessionError>;

    /// Suspend until the counterparty sends a message.
    async fn receive(&mut self) -> Result<NotaryEnvelope, SessionError>;

    /// Like [`FlowSession::receive`] but gives up after `limit`.
    async fn receive_within(&mut self, limit: Duration) -> Result<NotaryEnvelope, SessionError> {
        let session = self.session_id();
        match tokio::time::timeout(limit, self.receive()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                session,
                waited_ms: limit.as_millis() as u64,
            }),
        }
    }
}
