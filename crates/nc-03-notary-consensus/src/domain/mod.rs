//! Domain types for consensus backends.

pub mod command;
pub mod config;
pub mod errors;

pub use command::{CommitCommand, CommitVerdict};
pub use config::{ClusterConfig, ConsensusMode};
pub use errors::{CommitError, CommitResult, ConsensusConfigError};
