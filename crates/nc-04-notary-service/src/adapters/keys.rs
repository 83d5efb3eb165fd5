//! Ed25519 key service backed by an in-memory key pair.

use crate::ports::KeyService;
use shared_crypto::{is_valid_signature, KeyPair};
use shared_types::{PublicKey, Signature};

#[derive(Debug, Clone)]
pub struct Ed25519KeyService {
    keypair: KeyPair,
}

impl Ed25519KeyService {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }
}

impl KeyService for Ed25519KeyService {
    fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    fn sign(&self, data: &[u8]) -> Signature {
        self.keypair.sign(data)
    }

    fn verify_signature(&self, data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
        is_valid_signature(public_key, data, signature)
    }
}
