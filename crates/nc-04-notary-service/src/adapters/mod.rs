//! Adapters for the notary service ports.

pub mod keys;
pub mod resolving_verifier;

pub use keys::Ed25519KeyService;
pub use resolving_verifier::{ContractRule, ResolvingVerifier};
