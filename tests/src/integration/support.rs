//! Fixtures shared by the integration scenarios.

use nc_01_uniqueness_ledger::{InMemoryUniquenessLedger, UniquenessLedger};
use nc_03_notary_consensus::{FixedTimeSource, SingleAuthorityBackend, UniquenessProvider};
use nc_04_notary_service::{
    Ed25519KeyService, NotaryService, NotaryServiceConfig, NotaryServiceDependencies,
    ResolvingVerifier,
};
use nc_05_notary_client::{NotaryClient, NotaryClientFlow};
use shared_bus::NotaryEndpoint;
use shared_crypto::KeyPair;
use shared_types::{
    Party, SignedTransaction, StateRef, TimeWindow, TransactionId, TransactionSignature,
    WireTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Clock reading every fixture notary starts at.
pub const NOW: u64 = 1_700_000_000;

/// A notary service running on its own task.
pub struct TestNotary {
    pub identity: Party,
    pub key: KeyPair,
    pub ledger: Arc<dyn UniquenessLedger>,
    pub clock: Arc<FixedTimeSource>,
    validating: bool,
    endpoint: NotaryEndpoint,
    server: JoinHandle<usize>,
}

impl TestNotary {
    /// Single-authority notary over a fresh in-memory ledger.
    pub fn single_authority(validating: bool) -> Self {
        let ledger: Arc<dyn UniquenessLedger> = Arc::new(InMemoryUniquenessLedger::new());
        let clock = Arc::new(FixedTimeSource::new(NOW));
        let backend = Arc::new(SingleAuthorityBackend::new(Arc::clone(&ledger), clock.clone()));
        Self::serving(backend, ledger, clock, validating)
    }

    /// Notary committing through `backend`; `ledger` is the one it writes to.
    pub fn serving(
        backend: Arc<dyn UniquenessProvider>,
        ledger: Arc<dyn UniquenessLedger>,
        clock: Arc<FixedTimeSource>,
        validating: bool,
    ) -> Self {
        let key = KeyPair::from_seed([0x70; 32]);
        let identity = Party::new("O=Notary Service, L=Zurich, C=CH", key.public_key());
        let mut config = NotaryServiceConfig::new(identity.clone(), validating);
        config.receive_timeout = Duration::from_secs(5);

        let service = NotaryService::new(NotaryServiceDependencies {
            backend,
            keys: Arc::new(Ed25519KeyService::new(key.clone())),
            verifier: Arc::new(ResolvingVerifier::new()),
            time_source: clock.clone(),
            config,
        });

        let (endpoint, listener) = NotaryEndpoint::new(&identity.name);
        let server = tokio::spawn(async move { service.serve(listener).await });

        Self {
            identity,
            key,
            ledger,
            clock,
            validating,
            endpoint,
            server,
        }
    }

    pub fn client(&self, requester: &str) -> NotaryClient {
        NotaryClient::new(
            requester,
            self.endpoint.clone(),
            NotaryClientFlow::new(self.validating).with_response_timeout(Duration::from_secs(15)),
        )
    }

    /// Drop the endpoint and wait for the service to drain. Every client
    /// must be dropped first.
    pub async fn stop(self) -> usize {
        drop(self.endpoint);
        self.server.await.unwrap()
    }
}

pub fn party_key(n: u8) -> KeyPair {
    KeyPair::from_seed([n; 32])
}

/// Output `index` of a transaction that never went through this notary.
pub fn state(n: u8, index: u32) -> StateRef {
    StateRef::new(TransactionId([0xC0 ^ n; 32]), index)
}

/// Transaction consuming `inputs`, required and signed by every key in
/// `signers`. `nonce` keeps otherwise identical transactions apart.
pub fn spend(
    notary: &Party,
    inputs: Vec<StateRef>,
    signers: &[&KeyPair],
    nonce: u8,
) -> SignedTransaction {
    sign(
        WireTransaction {
            inputs,
            outputs: vec![format!("cash-{nonce}").into_bytes()],
            commands: vec![b"move".to_vec(), vec![nonce]],
            required_signers: signers.iter().map(|k| k.public_key()).collect(),
            time_window: None,
            notary: notary.clone(),
        },
        signers,
    )
}

/// Like [`spend`], constrained to `window`.
pub fn spend_within(
    notary: &Party,
    inputs: Vec<StateRef>,
    signer: &KeyPair,
    window: TimeWindow,
) -> SignedTransaction {
    let mut tx = spend(notary, inputs, &[signer], 0).tx;
    tx.time_window = Some(window);
    sign(tx, &[signer])
}

/// Issuance with `outputs` outputs and no inputs, for dependency chains.
pub fn issuance(notary: &Party, outputs: usize) -> SignedTransaction {
    SignedTransaction::new(
        WireTransaction {
            inputs: vec![],
            outputs: (0..outputs).map(|i| format!("bond-{i}").into_bytes()).collect(),
            commands: vec![b"issue".to_vec()],
            required_signers: vec![],
            time_window: None,
            notary: notary.clone(),
        },
        vec![],
    )
}

pub fn sign(tx: WireTransaction, signers: &[&KeyPair]) -> SignedTransaction {
    let id = tx.id();
    let sigs = signers
        .iter()
        .map(|key| TransactionSignature {
            by: key.public_key(),
            bytes: key.sign(id.as_bytes()),
        })
        .collect();
    SignedTransaction::new(tx, sigs)
}

/// Wait until every ledger holds `expected` records.
pub async fn settle(ledgers: &[Arc<dyn UniquenessLedger>], expected: usize) {
    for _ in 0..150 {
        if ledgers.iter().all(|l| l.len().unwrap() == expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
