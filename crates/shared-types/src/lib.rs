//! # Shared Types Crate
//!
//! Ledger primitives, the notary error taxonomy and the session payloads
//! exchanged between a requesting party and a notary.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type crossing a crate boundary lives here.
//! - **Content Addressing**: a transaction's id is derived from its content,
//!   never trusted from the sender.
//! - **Typed Failures**: the counterparty of a notary only ever observes a
//!   [`NotaryError`] variant, never a raw lower-level failure.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod messages;

pub use entities::*;
pub use envelope::SessionEnvelope;
pub use errors::*;
pub use messages::*;
