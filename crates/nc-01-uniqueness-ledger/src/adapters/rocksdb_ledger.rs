//! # RocksDB Uniqueness Ledger
//!
//! Persistent ledger for notary nodes.
//!
//! ## Layout
//!
//! - Key: 32-byte source transaction id followed by the big-endian output
//!   index, so key order equals `StateRef` order.
//! - Value: bincode-encoded [`CommitRecord`].
//!
//! A commit plans against the database under the write lock and writes all
//! new records in one `WriteBatch`.

use crate::domain::{
    plan_commit, records_digest, CommitOutcome, CommitRecord, LedgerError, LedgerResult,
};
use crate::ports::UniquenessLedger;
use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use shared_crypto::Digest;
use shared_types::{ConflictSet, StateRef, TransactionId};
use tracing::{debug, info};

/// RocksDB settings for the ledger.
#[derive(Debug, Clone)]
pub struct RocksDbLedgerConfig {
    /// Database directory.
    pub path: String,
    /// Write buffer size in bytes (default: 16MB).
    pub write_buffer_size: usize,
    /// fsync every commit (default: true).
    pub sync_writes: bool,
}

impl Default for RocksDbLedgerConfig {
    fn default() -> Self {
        Self {
            path: "./data/uniqueness".to_string(),
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbLedgerConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// Ledger stored in a RocksDB database.
pub struct RocksDbUniquenessLedger {
    db: RwLock<DB>,
    config: RocksDbLedgerConfig,
}

fn state_key(state: &StateRef) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(&state.txhash.0);
    key[32..].copy_from_slice(&state.index.to_be_bytes());
    key
}

fn storage_err(op: &str, e: rocksdb::Error) -> LedgerError {
    LedgerError::Storage(format!("RocksDB {op} failed: {e}"))
}

fn decode(bytes: &[u8]) -> LedgerResult<CommitRecord> {
    bincode::deserialize(bytes).map_err(|e| LedgerError::Corrupted(e.to_string()))
}

impl RocksDbUniquenessLedger {
    /// Open or create the ledger database.
    pub fn open(config: RocksDbLedgerConfig) -> LedgerResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path).map_err(|e| storage_err("open", e))?;
        info!(path = %config.path, "Uniqueness ledger opened");

        Ok(Self {
            db: RwLock::new(db),
            config,
        })
    }

    fn lookup(db: &DB, state: &StateRef) -> LedgerResult<Option<CommitRecord>> {
        db.get(state_key(state))
            .map_err(|e| storage_err("get", e))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn all_records(db: &DB) -> LedgerResult<Vec<CommitRecord>> {
        db.iterator(IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(|e| storage_err("iterate", e))?;
                decode(&value)
            })
            .collect()
    }
}

impl UniquenessLedger for RocksDbUniquenessLedger {
    fn try_commit(
        &self,
        batch: &[(StateRef, TransactionId)],
        committed_at: u64,
    ) -> LedgerResult<CommitOutcome> {
        let db = self.db.write();
        let plan = plan_commit(batch, committed_at, |s| {
            Ok(Self::lookup(&db, s)?.map(|r| r.consuming_tx))
        })?;

        if !plan.new_records.is_empty() {
            let mut write = WriteBatch::default();
            for record in &plan.new_records {
                let value = bincode::serialize(record)
                    .map_err(|e| LedgerError::Storage(format!("encode failed: {e}")))?;
                write.put(state_key(&record.state_ref), value);
            }

            let mut write_opts = WriteOptions::default();
            write_opts.set_sync(self.config.sync_writes);
            db.write_opt(write, &write_opts)
                .map_err(|e| storage_err("batch write", e))?;
        }

        let outcome = plan.outcome();
        debug!(
            recorded = outcome.recorded,
            replayed = outcome.already_committed,
            "Batch committed to RocksDB"
        );
        Ok(outcome)
    }

    fn conflicts(&self, batch: &[(StateRef, TransactionId)]) -> LedgerResult<ConflictSet> {
        let db = self.db.read();
        match plan_commit(batch, 0, |s| Ok(Self::lookup(&db, s)?.map(|r| r.consuming_tx))) {
            Ok(_) => Ok(ConflictSet::new()),
            Err(LedgerError::Conflict(conflicts)) => Ok(conflicts),
            Err(other) => Err(other),
        }
    }

    fn get(&self, state: &StateRef) -> LedgerResult<Option<CommitRecord>> {
        Self::lookup(&self.db.read(), state)
    }

    fn len(&self) -> LedgerResult<usize> {
        let db = self.db.read();
        let mut count = 0;
        for item in db.iterator(IteratorMode::Start) {
            item.map_err(|e| storage_err("iterate", e))?;
            count += 1;
        }
        Ok(count)
    }

    fn state_digest(&self) -> LedgerResult<Digest> {
        let records = Self::all_records(&self.db.read())?;
        Ok(records_digest(&records))
    }
}
