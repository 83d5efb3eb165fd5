//! # Shared Crypto
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Party, notary and replica signatures |
//! | `hashing` | BLAKE3 | Batch digests, ledger state digests, seed derivation |
//!
//! ## Security Properties
//!
//! - **Ed25519**: deterministic nonces, so the notary's signature over a
//!   transaction id is identical on every replay
//! - **BLAKE3**: domain-separated key derivation for development seeds

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{derive_seed, digest, digest_many, digest_of, Digest, DigestWriter};
pub use signatures::{is_valid_signature, verify_signature, KeyPair};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
