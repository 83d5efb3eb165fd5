//! # Shared Bus - Notarisation Sessions
//!
//! Point-to-point sessions between a requesting party and a notary.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐   connect()    ┌────────────────┐   accept()   ┌──────────────┐
//! │  Requester   │ ─────────────→ │ NotaryEndpoint │ ───────────→ │ Notary flow  │
//! │  (client)    │                └────────────────┘              │  (service)   │
//! │              │ ◄═══════════ FlowSession (send / receive) ════►│              │
//! └──────────────┘                                                └──────────────┘
//! ```
//!
//! `receive` suspends the calling task until the counterparty sends or the
//! session closes; it never blocks a worker thread.
//!
//! Transport and session establishment between real nodes are provided by
//! the hosting platform; the in-memory adapter here connects flows running in
//! one process.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod listener;
pub mod memory;
pub mod session;

// Re-export main types
pub use listener::{NotaryEndpoint, SessionListener};
pub use memory::{session_pair, InMemorySession};
pub use session::{FlowSession, NotaryEnvelope, SessionError};

/// Messages buffered per session direction before `send` suspends.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Sessions buffered by an endpoint before `connect` suspends.
pub const DEFAULT_BACKLOG: usize = 1024;
