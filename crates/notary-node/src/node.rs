//! # Notary Node
//!
//! Wires the configured pieces together:
//!
//! ```text
//! NotaryEndpoint ──→ NotaryService ──→ ConsensusBackend ──→ UniquenessLedger
//!                    (flow per session)   (single / cluster)   (memory / rocksdb)
//! ```

use crate::config::{ConfigError, NotaryConfig, StorageConfig};
use nc_01_uniqueness_ledger::{InMemoryUniquenessLedger, LedgerError, UniquenessLedger};
use nc_03_notary_consensus::{
    ConsensusBackend, ConsensusConfigError, SystemTimeSource, UniquenessProvider,
};
use nc_04_notary_service::{
    Ed25519KeyService, NotaryService, NotaryServiceConfig, NotaryServiceDependencies,
    ResolvingVerifier,
};
use shared_bus::NotaryEndpoint;
use shared_types::Party;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Consensus backend failed to start: {0}")]
    Consensus(#[from] ConsensusConfigError),

    #[error("Ledger failed to open: {0}")]
    Ledger(#[from] LedgerError),
}

pub struct NotaryNode {
    identity: Party,
    endpoint: NotaryEndpoint,
    backend: Arc<ConsensusBackend>,
    ledger: Arc<dyn UniquenessLedger>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<usize>,
}

impl NotaryNode {
    /// Validate `config` and start serving. Must be called from within a
    /// tokio runtime.
    pub fn start(config: NotaryConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let keypair = config.keypair()?;
        let identity = Party::new(config.notary_name.clone(), keypair.public_key());

        let ledger = open_ledger(&config.storage)?;
        let time_source = Arc::new(SystemTimeSource);
        let backend = Arc::new(ConsensusBackend::start(
            &config.mode,
            Arc::clone(&ledger),
            time_source.clone(),
        )?);

        let mut service_config = NotaryServiceConfig::new(identity.clone(), config.validating);
        service_config.receive_timeout = config.receive_timeout();
        let service = NotaryService::new(NotaryServiceDependencies {
            backend: backend.clone(),
            keys: Arc::new(Ed25519KeyService::new(keypair)),
            verifier: Arc::new(ResolvingVerifier::new()),
            time_source,
            config: service_config,
        });

        let (endpoint, listener) = NotaryEndpoint::new(&identity.name);
        let (shutdown, stop) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            service
                .serve_until(listener, async {
                    let _ = stop.await;
                })
                .await
        });

        info!(
            notary = %identity,
            address = config.notary_node_address.as_deref().unwrap_or("in-process"),
            backend = backend.name(),
            validating = config.validating,
            "Notary node started"
        );

        Ok(Self {
            identity,
            endpoint,
            backend,
            ledger,
            shutdown,
            server,
        })
    }

    pub fn identity(&self) -> &Party {
        &self.identity
    }

    /// Endpoint requesters open sessions through.
    pub fn endpoint(&self) -> NotaryEndpoint {
        self.endpoint.clone()
    }

    pub fn backend(&self) -> &Arc<ConsensusBackend> {
        &self.backend
    }

    /// The ledger this node writes to.
    pub fn ledger(&self) -> &Arc<dyn UniquenessLedger> {
        &self.ledger
    }

    /// Stop accepting sessions and wait for running flows. Returns the
    /// number of sessions served.
    pub async fn shutdown(self) -> usize {
        info!(notary = %self.identity, "Stopping notary node");
        let _ = self.shutdown.send(());
        drop(self.endpoint);
        match self.server.await {
            Ok(served) => served,
            Err(e) => {
                warn!(error = %e, "Notary service task failed");
                0
            }
        }
    }
}

#[cfg(feature = "rocksdb")]
fn open_ledger(storage: &StorageConfig) -> Result<Arc<dyn UniquenessLedger>, NodeError> {
    use nc_01_uniqueness_ledger::{RocksDbLedgerConfig, RocksDbUniquenessLedger};

    let Some(dir) = &storage.data_dir else {
        return Ok(Arc::new(InMemoryUniquenessLedger::new()));
    };
    let ledger = RocksDbUniquenessLedger::open(RocksDbLedgerConfig {
        path: dir.to_string_lossy().into_owned(),
        sync_writes: storage.sync_writes,
        ..RocksDbLedgerConfig::default()
    })?;
    info!(path = %dir.display(), records = ledger.len()?, "Opened persistent ledger");
    Ok(Arc::new(ledger))
}

#[cfg(not(feature = "rocksdb"))]
fn open_ledger(storage: &StorageConfig) -> Result<Arc<dyn UniquenessLedger>, NodeError> {
    if let Some(dir) = &storage.data_dir {
        warn!(path = %dir.display(), "Built without rocksdb; ledger kept in memory");
    }
    Ok(Arc::new(InMemoryUniquenessLedger::new()))
}
