//! # Notary Node
//!
//! Configuration loading and wiring for a notary process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, JSON file, environment)
//! 2. Validate it; invalid configuration aborts startup
//! 3. Open the uniqueness ledger
//! 4. Start the consensus backend (single authority or local cluster)
//! 5. Serve notarisation sessions until shutdown

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod node;

pub use config::{ConfigError, NotaryConfig, StorageConfig};
pub use node::{NodeError, NotaryNode};
