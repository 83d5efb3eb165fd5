//! # Core Ledger Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Party`, `PublicKey`, `TransactionSignature`
//! - **Transactions**: `TransactionId`, `StateRef`, `TimeWindow`,
//!   `WireTransaction`, `SignedTransaction`
//! - **Notarisation**: `TransactionParts`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// A 32-byte hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Domain separator mixed into every transaction id.
const TRANSACTION_ID_DOMAIN: &[u8] = b"notary.wire-transaction.v1";

// =============================================================================
// IDENTITY
// =============================================================================

/// A well-known ledger identity: a legal name and the key it signs with.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    /// Human readable legal name.
    pub name: String,
    /// Key used to sign on behalf of this party.
    pub owning_key: PublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({}, {})", self.name, short_hex(&self.owning_key))
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A signature over a transaction id, tagged with the signing key.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    /// Public key of the signer.
    pub by: PublicKey,
    /// Raw signature bytes.
    #[serde_as(as = "Bytes")]
    pub bytes: Signature,
}

impl fmt::Debug for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransactionSignature(by={}, sig={})",
            short_hex(&self.by),
            short_hex(&self.bytes)
        )
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Content-derived identifier of a transaction.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Hash);

impl TransactionId {
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", short_hex(&self.0))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Pointer to one output of a specific transaction.
///
/// Ordering is by `(txhash, index)`, which every replica uses to process
/// batches deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    /// Transaction that created the state.
    pub txhash: TransactionId,
    /// Index of the state among that transaction's outputs.
    pub index: u32,
}

impl StateRef {
    pub fn new(txhash: TransactionId, index: u32) -> Self {
        Self { txhash, index }
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({}:{})", short_hex(&self.txhash.0), self.index)
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

/// Interval of unix seconds in which a transaction may be notarised.
///
/// `not_before` is inclusive and `not_after` exclusive; either bound may be
/// absent but not both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub not_before: Option<u64>,
    pub not_after: Option<u64>,
}

impl TimeWindow {
    /// Window `[not_before, not_after)`.
    pub fn between(not_before: u64, not_after: u64) -> Self {
        Self {
            not_before: Some(not_before),
            not_after: Some(not_after),
        }
    }

    /// Window open towards the future.
    pub fn from_only(not_before: u64) -> Self {
        Self {
            not_before: Some(not_before),
            not_after: None,
        }
    }

    /// Window open towards the past.
    pub fn until_only(not_after: u64) -> Self {
        Self {
            not_before: None,
            not_after: Some(not_after),
        }
    }

    /// Whether `instant` lies inside the window.
    pub fn contains(&self, instant: u64) -> bool {
        let after_start = self.not_before.map_or(true, |start| instant >= start);
        let before_end = self.not_after.map_or(true, |end| instant < end);
        after_start && before_end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.not_before, self.not_after) {
            (Some(a), Some(b)) => write!(f, "[{a}, {b})"),
            (Some(a), None) => write!(f, "[{a}, ..)"),
            (None, Some(b)) => write!(f, "(.., {b})"),
            (None, None) => f.write_str("(..)"),
        }
    }
}

/// The unsigned content of a transaction.
///
/// Outputs and commands are opaque to the notary; contract semantics are
/// checked by the transaction verification collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    /// States consumed by this transaction, in declaration order.
    pub inputs: Vec<StateRef>,
    /// Encoded output states.
    pub outputs: Vec<Vec<u8>>,
    /// Encoded commands.
    pub commands: Vec<Vec<u8>>,
    /// Keys whose signatures are required for the transaction to be valid.
    pub required_signers: Vec<PublicKey>,
    /// Optional validity interval.
    pub time_window: Option<TimeWindow>,
    /// Notary that must witness the consumption of `inputs`.
    pub notary: Party,
}

impl WireTransaction {
    /// Content hash of the transaction.
    ///
    /// Every field is length-prefixed so distinct transactions cannot
    /// collide by shifting bytes between fields.
    pub fn id(&self) -> TransactionId {
        let mut h = Sha256::new();
        h.update(TRANSACTION_ID_DOMAIN);

        h.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            h.update(input.txhash.0);
            h.update(input.index.to_le_bytes());
        }

        for group in [&self.outputs, &self.commands] {
            h.update((group.len() as u64).to_le_bytes());
            for item in group {
                h.update((item.len() as u64).to_le_bytes());
                h.update(item);
            }
        }

        h.update((self.required_signers.len() as u64).to_le_bytes());
        for key in &self.required_signers {
            h.update(key);
        }

        match self.time_window {
            None => h.update([0u8]),
            Some(window) => {
                h.update([1u8]);
                for bound in [window.not_before, window.not_after] {
                    match bound {
                        None => h.update([0u8]),
                        Some(t) => {
                            h.update([1u8]);
                            h.update(t.to_le_bytes());
                        }
                    }
                }
            }
        }

        h.update((self.notary.name.len() as u64).to_le_bytes());
        h.update(self.notary.name.as_bytes());
        h.update(self.notary.owning_key);

        TransactionId(h.finalize().into())
    }
}

/// A transaction together with the signatures collected so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, sigs: Vec<TransactionSignature>) -> Self {
        Self { tx, sigs }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    /// Return a copy with `sig` appended.
    pub fn with_signature(mut self, sig: TransactionSignature) -> Self {
        self.sigs.push(sig);
        self
    }

    /// Required signers without a signature, ignoring keys in `except`.
    pub fn missing_signers(&self, except: &[PublicKey]) -> BTreeSet<PublicKey> {
        let present: BTreeSet<PublicKey> = self.sigs.iter().map(|s| s.by).collect();
        self.tx
            .required_signers
            .iter()
            .filter(|key| !present.contains(*key) && !except.contains(*key))
            .copied()
            .collect()
    }
}

// =============================================================================
// NOTARISATION
// =============================================================================

/// The parts of a transaction a consensus backend needs to commit it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParts {
    pub id: TransactionId,
    pub inputs: Vec<StateRef>,
    pub time_window: Option<TimeWindow>,
    pub notary: Party,
}

impl TransactionParts {
    pub fn from_transaction(tx: &WireTransaction) -> Self {
        Self {
            id: tx.id(),
            inputs: tx.inputs.clone(),
            time_window: tx.time_window,
            notary: tx.notary.clone(),
        }
    }

    /// `(StateRef, TransactionId)` pairs in declaration order.
    pub fn commit_batch(&self) -> Vec<(StateRef, TransactionId)> {
        self.inputs.iter().map(|input| (*input, self.id)).collect()
    }
}

/// First four bytes of `bytes` as hex, for log and debug output.
pub fn short_hex(bytes: &[u8]) -> String {
    let end = bytes.len().min(4);
    format!("{}..", hex::encode(&bytes[..end]))
}
