//! # Ed25519 Signatures
//!
//! Keys are handled as raw byte arrays at the crate boundary so callers can
//! store and transmit them without depending on the curve library.
//!
//! ## Security Properties
//!
//! - No RNG dependency when signing (deterministic nonce from message)
//! - Strict verification rejects malleable signatures
//! - Secret key material is zeroized when the signing key is dropped

use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use std::fmt;

/// Raw Ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// Raw Ed25519 signature.
pub type SignatureBytes = [u8; 64];

/// An Ed25519 signing key together with its public half.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Create from a seed slice, checking that it is 32 bytes long.
    pub fn from_seed_slice(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            CryptoError::InvalidSeed(format!("expected 32 bytes, got {}", seed.len()))
        })?;
        Ok(Self::from_seed(seed))
    }

    /// Public key bytes.
    pub fn public_key(&self) -> PublicKeyBytes {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verify `signature` over `message` by `public_key`.
pub fn verify_signature(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = Signature::from_bytes(signature);

    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Boolean form of [`verify_signature`].
pub fn is_valid_signature(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> bool {
    verify_signature(public_key, message, signature).is_ok()
}
