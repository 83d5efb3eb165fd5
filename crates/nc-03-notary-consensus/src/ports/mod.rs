//! Ports for consensus backends.

use crate::domain::CommitResult;
use async_trait::async_trait;
use nc_01_uniqueness_ledger::CommitOutcome;
use shared_types::TransactionParts;

/// Commits a validated transaction's inputs to the uniqueness ledger.
///
/// The one operation through which the notary mutates the ledger.
#[async_trait]
pub trait UniquenessProvider: Send + Sync {
    /// Consume every input of `parts` for `parts.id`, or none of them.
    ///
    /// Re-committing a transaction whose inputs it already consumed succeeds.
    async fn commit(&self, parts: &TransactionParts) -> CommitResult<CommitOutcome>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Source of the notary's clock, in unix seconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock that stands still. Tests set it explicitly.
#[derive(Debug, Default)]
pub struct FixedTimeSource(std::sync::atomic::AtomicU64);

impl FixedTimeSource {
    pub fn new(now: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
