//! # Notary Test Suite
//!
//! Cross-crate scenarios: requesting flows talking to a running notary
//! service over in-memory sessions, backed by a single authority or an
//! in-process replicated cluster.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs        # Notary fixtures and transaction builders
//!     ├── notarisation.rs   # Request/response outcomes end to end
//!     ├── concurrency.rs    # Competing spenders of one input
//!     ├── byzantine.rs      # Faulty replicas behind the service
//!     └── node.rs           # Nodes started from configuration
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p notary-tests
//! cargo test -p notary-tests integration::byzantine::
//! ```

#[cfg(test)]
pub mod integration;
