//! Storage adapters for the uniqueness ledger.

mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb_ledger;

pub use memory::InMemoryUniquenessLedger;
#[cfg(feature = "rocksdb")]
pub use rocksdb_ledger::{RocksDbLedgerConfig, RocksDbUniquenessLedger};
