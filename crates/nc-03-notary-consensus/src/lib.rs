//! # Notary Consensus
//!
//! The backends through which the notary commits transactions to its
//! uniqueness ledger.
//!
//! | Backend | Writers | Failure model |
//! |---------|---------|---------------|
//! | [`SingleAuthorityBackend`] | one node | fail-stop |
//! | [`ReplicatedClusterBackend`] | every replica | `f` of `3f + 1` Byzantine or `2f + 1` crash |
//!
//! Both implement [`UniquenessProvider`]. [`ConsensusBackend`] selects one
//! from a [`ConsensusMode`].
//!
//! ## Replicated commit path
//!
//! ```text
//! commit(parts)
//!    │  CommitCommand (bincode)
//!    ▼
//! BroadcastHandle::submit ──→ PBFT ordering ──→ LedgerStateMachine::apply
//!    ▲                                              │ on every replica
//!    └──────────── quorum of matching CommitVerdicts ┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod backend;
pub mod domain;
pub mod local_cluster;
pub mod ports;

pub use adapters::{LedgerStateMachine, ReplicatedClusterBackend, SingleAuthorityBackend};
pub use backend::ConsensusBackend;
pub use domain::{
    ClusterConfig, CommitCommand, CommitError, CommitResult, CommitVerdict, ConsensusConfigError,
    ConsensusMode,
};
pub use local_cluster::{replica_keypair, LocalCluster, LocalClusterBuilder};
pub use ports::{FixedTimeSource, SystemTimeSource, TimeSource, UniquenessProvider};
