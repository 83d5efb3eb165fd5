//! # Notary Service
//!
//! The notary side of a notarisation session.
//!
//! ## Flow
//!
//! ```text
//! AwaitingRequest ──receive──→ Validating ──ok──→ RequestingCommit ──ok──→ Committed ──→ Done
//!                                  │                     │
//!                                  └──── error ──────────┴──→ Rejected ──→ Done
//! ```
//!
//! Each session runs as its own task. The consensus backend behind
//! [`UniquenessProvider`](ports::UniquenessProvider) is the only component
//! that writes to the uniqueness ledger.
//!
//! ## Validating vs. non-validating
//!
//! Both variants share the notary, signature and time-window checks and the
//! commit/reply machinery. A [`ValidationPolicy`] decides whether the
//! dependency chain is resolved and contracts verified.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod validation;

pub use adapters::{ContractRule, Ed25519KeyService, ResolvingVerifier};
pub use domain::{FlowState, NotaryServiceConfig, ServiceError, ServiceResult};
pub use ports::{KeyService, TransactionVerifier, VerificationError, VerifiedTransaction};
pub use service::{FlowReport, NotaryService, NotaryServiceDependencies, NotaryServiceFlow};
pub use validation::{
    NonValidatingPolicy, TransactionValidator, ValidatingPolicy, ValidationPolicy,
};

#[cfg(test)]
mod tests;
