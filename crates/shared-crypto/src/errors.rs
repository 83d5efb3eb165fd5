//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature did not verify against the key and message
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Bytes do not encode a curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Secret seed has the wrong shape
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Value could not be encoded for hashing
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}
