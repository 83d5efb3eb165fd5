//! # Uniqueness Ledger
//!
//! Durable mapping from each consumed [`StateRef`](shared_types::StateRef) to
//! the transaction that consumed it.
//!
//! ## Guarantees
//!
//! | Property | Meaning |
//! |----------|---------|
//! | Atomic | A batch is recorded entirely or not at all |
//! | Complete conflicts | A refused batch reports every colliding input and its consumer |
//! | Idempotent | Re-committing a transaction's own inputs succeeds without new records |
//! | Write-once | A record is never overwritten or deleted |
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐      ┌────────────────────────────┐
//! │ Consensus backend  │─────→│ UniquenessLedger (port)    │
//! └────────────────────┘      └────────────┬───────────────┘
//!                                          │
//!                     ┌────────────────────┴──────────────────┐
//!                     │                                       │
//!          ┌──────────▼────────────┐          ┌───────────────▼──────────┐
//!          │ InMemoryUniqueness-   │          │ RocksDbUniquenessLedger  │
//!          │ Ledger                │          │ (feature = "rocksdb")    │
//!          └───────────────────────┘          └──────────────────────────┘
//! ```
//!
//! The ledger is only mutated through a consensus backend; nothing else in
//! the node calls `try_commit`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryUniquenessLedger;
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbLedgerConfig, RocksDbUniquenessLedger};
pub use domain::{plan_commit, CommitOutcome, CommitPlan, CommitRecord, LedgerError, LedgerResult};
pub use ports::UniquenessLedger;
