//! Ledger domain: records, errors and the storage-independent commit planner.

mod errors;
mod planner;
mod record;

pub use errors::{LedgerError, LedgerResult};
pub use planner::{plan_commit, CommitPlan};
pub use record::{records_digest, CommitOutcome, CommitRecord};
