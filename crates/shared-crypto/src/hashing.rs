//! # BLAKE3 Digests
//!
//! Content digests for replicated batches and ledger snapshots, plus
//! domain-separated seed derivation for development keys.

use crate::CryptoError;
use serde::Serialize;
use std::io;

/// BLAKE3 output (256-bit).
pub type Digest = [u8; 32];

/// Digest of a byte string.
pub fn digest(data: &[u8]) -> Digest {
    *blake3::hash(data).as_bytes()
}

/// Digest of several byte strings fed in order.
pub fn digest_many(inputs: &[&[u8]]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    *hasher.finalize().as_bytes()
}

/// Digest of the bincode encoding of `value`.
///
/// The encoding is streamed into the hasher, so large values are never
/// materialised as one buffer.
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> Result<Digest, CryptoError> {
    let mut writer = DigestWriter::new();
    bincode::serialize_into(&mut writer, value)
        .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
    Ok(writer.finalize())
}

/// Derive a 32-byte seed from `material` under `context`.
///
/// Used to give development nodes and test replicas stable keys.
pub fn derive_seed(context: &str, material: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, material)
}

/// An `io::Write` sink that hashes everything written to it.
#[derive(Default)]
pub struct DigestWriter {
    inner: blake3::Hasher,
}

impl DigestWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of everything written so far.
    pub fn finalize(&self) -> Digest {
        *self.inner.finalize().as_bytes()
    }
}

impl io::Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
