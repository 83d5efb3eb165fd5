//! # Session Establishment
//!
//! A notary exposes a [`NotaryEndpoint`] that requesters connect through, and
//! owns the matching [`SessionListener`] that hands each new session to a
//! fresh notary flow.

use crate::memory::{session_pair, InMemorySession};
use crate::session::SessionError;
use crate::DEFAULT_BACKLOG;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Cloneable handle requesters use to open sessions with one notary.
#[derive(Debug, Clone)]
pub struct NotaryEndpoint {
    notary_name: String,
    incoming: mpsc::Sender<InMemorySession>,
    opened: Arc<AtomicU64>,
}

/// Receives sessions opened against a [`NotaryEndpoint`].
#[derive(Debug)]
pub struct SessionListener {
    notary_name: String,
    incoming: mpsc::Receiver<InMemorySession>,
}

impl NotaryEndpoint {
    /// Create an endpoint and its listener for `notary_name`.
    #[must_use]
    pub fn new(notary_name: &str) -> (Self, SessionListener) {
        Self::with_backlog(notary_name, DEFAULT_BACKLOG)
    }

    /// Create with an explicit pending-session backlog.
    #[must_use]
    pub fn with_backlog(notary_name: &str, backlog: usize) -> (Self, SessionListener) {
        let (tx, rx) = mpsc::channel(backlog.max(1));
        let endpoint = Self {
            notary_name: notary_name.to_string(),
            incoming: tx,
            opened: Arc::new(AtomicU64::new(0)),
        };
        let listener = SessionListener {
            notary_name: notary_name.to_string(),
            incoming: rx,
        };
        (endpoint, listener)
    }

    /// Name of the notary behind this endpoint.
    pub fn notary_name(&self) -> &str {
        &self.notary_name
    }

    /// Open a session on behalf of `requester`.
    ///
    /// Returns the requester's half; the notary's half is queued for
    /// [`SessionListener::accept`].
    pub async fn connect(&self, requester: &str) -> Result<InMemorySession, SessionError> {
        let (ours, theirs) = session_pair(requester, &self.notary_name);
        if self.incoming.send(theirs).await.is_err() {
            warn!(notary = %self.notary_name, requester, "Connect to closed endpoint");
            return Err(SessionError::EndpointClosed(self.notary_name.clone()));
        }
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(ours)
    }

    /// Total sessions opened through this endpoint and its clones.
    pub fn sessions_opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// True once the listener has been dropped.
    pub fn is_closed(&self) -> bool {
        self.incoming.is_closed()
    }
}

impl SessionListener {
    /// Wait for the next incoming session.
    ///
    /// Returns `None` when every endpoint handle has been dropped.
    pub async fn accept(&mut self) -> Option<InMemorySession> {
        let session = self.incoming.recv().await;
        if session.is_none() {
            debug!(notary = %self.notary_name, "All endpoints dropped; listener finished");
        }
        session
    }

    /// Stop accepting; queued sessions are still returned by `accept`.
    pub fn close(&mut self) {
        self.incoming.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlowSession;

    #[tokio::test]
    async fn test_connect_and_accept() {
        let (endpoint, mut listener) = NotaryEndpoint::new("Notary");

        let client_half = endpoint.connect("Alice").await.unwrap();
        let notary_half = listener.accept().await.unwrap();

        assert_eq!(client_half.session_id(), notary_half.session_id());
        assert_eq!(notary_half.counterparty(), "Alice");
        assert_eq!(notary_half.local_party(), "Notary");
        assert_eq!(endpoint.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_counter() {
        let (endpoint, mut listener) = NotaryEndpoint::new("Notary");
        let other = endpoint.clone();

        let _a = endpoint.connect("Alice").await.unwrap();
        let _b = other.connect("Bob").await.unwrap();
        let _ = listener.accept().await.unwrap();
        let _ = listener.accept().await.unwrap();

        assert_eq!(endpoint.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_connect_after_listener_dropped() {
        let (endpoint, listener) = NotaryEndpoint::new("Notary");
        drop(listener);

        assert!(endpoint.is_closed());
        assert_eq!(
            endpoint.connect("Alice").await.unwrap_err(),
            SessionError::EndpointClosed("Notary".into())
        );
    }

    #[tokio::test]
    async fn test_accept_ends_when_endpoints_dropped() {
        let (endpoint, mut listener) = NotaryEndpoint::new("Notary");
        drop(endpoint);
        assert!(listener.accept().await.is_none());
    }
}
