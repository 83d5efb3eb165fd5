//! # Notary Client
//!
//! The requesting party's side of notarisation.
//!
//! - [`NotaryClientFlow`]: one request/response exchange on an open session
//! - [`NotaryClient`]: opens a session per transaction against a
//!   [`NotaryEndpoint`](shared_bus::NotaryEndpoint)
//!
//! Failures are always a [`NotaryError`](shared_types::NotaryError); session
//! problems and untrustworthy responses surface as `General`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod flow;

pub use client::NotaryClient;
pub use flow::NotaryClientFlow;
