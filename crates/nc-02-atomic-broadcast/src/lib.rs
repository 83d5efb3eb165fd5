//! # Atomic Broadcast
//!
//! Byzantine fault tolerant total-order broadcast in the PBFT style, used by
//! the replicated notary to agree on the order of commit batches.
//!
//! ## Contract
//!
//! - **Agreement**: no two correct replicas deliver different payloads at the
//!   same sequence number.
//! - **Validity**: a payload submitted through a correct replica is delivered
//!   while at most `f` replicas are faulty and messages get through.
//! - **Total order**: correct replicas deliver payloads in sequence order, each
//!   payload at most once.
//!
//! ## Quorums
//!
//! | Fault model | Cluster size | Quorum |
//! |-------------|--------------|--------|
//! | Byzantine | `n = 3f + 1` | `2f + 1` |
//! | Crash | `n = 2f + 1` | `f + 1` |
//!
//! ## Layout
//!
//! - [`replica`]: the deterministic protocol state machine
//! - [`runner`]: the tokio task driving a replica, and [`BroadcastHandle`]
//! - [`ports`]: application, transport and outbound-policy traits
//! - [`adapters`]: in-process network and fault-injection policies
//! - [`cluster`]: an in-process replica group

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod cluster;
pub mod config;
pub mod error;
pub mod messages;
pub mod ports;
pub mod replica;
pub mod runner;

pub use cluster::{ClusterMember, LocalBroadcastCluster};
pub use config::{BroadcastConfig, FaultModel, Membership};
pub use error::{BroadcastError, BroadcastResult, TransportError};
pub use messages::{ReplicaId, SeqNumber, SignedMessage, ViewNumber};
pub use ports::{ClusterTransport, Delivery, OutboundPolicy, StateMachine};
pub use replica::{Decision, Replica, ReplicaStatus};
pub use runner::{spawn_replica, BroadcastHandle};
