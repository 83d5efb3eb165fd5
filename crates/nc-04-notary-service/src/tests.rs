use super::*;
use crate::ports::FixedTimeSource;
use async_trait::async_trait;
use nc_01_uniqueness_ledger::CommitOutcome;
use nc_03_notary_consensus::{CommitError, CommitResult, UniquenessProvider};
use shared_bus::{
    session_pair, FlowSession, InMemorySession, NotaryEndpoint, NotaryEnvelope, SessionError,
};
use shared_crypto::{is_valid_signature, KeyPair};
use shared_types::{
    ConflictSet, NotarisationRequest, NotarisationResponse, NotaryError, NotaryMessage, Party,
    SignedTransaction, StateRef, TransactionId, TransactionParts, TransactionSignature,
    WireTransaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct MockBackend {
    calls: AtomicUsize,
    result: CommitResult<CommitOutcome>,
}

impl MockBackend {
    fn returning(result: CommitResult<CommitOutcome>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result,
        })
    }

    fn accepting() -> Arc<Self> {
        Self::returning(Ok(CommitOutcome {
            recorded: 1,
            already_committed: 0,
        }))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UniquenessProvider for MockBackend {
    async fn commit(&self, _parts: &TransactionParts) -> CommitResult<CommitOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct Fixture {
    notary_key: KeyPair,
    alice: KeyPair,
    backend: Arc<MockBackend>,
    service: NotaryService,
}

impl Fixture {
    fn new(backend: Arc<MockBackend>) -> Self {
        let notary_key = KeyPair::from_seed([11; 32]);
        let notary = Party::new("O=Notary Service, L=Zurich, C=CH", notary_key.public_key());
        let mut config = NotaryServiceConfig::new(notary, false);
        config.receive_timeout = Duration::from_millis(100);

        let service = NotaryService::new(NotaryServiceDependencies {
            backend: backend.clone(),
            keys: Arc::new(Ed25519KeyService::new(notary_key.clone())),
            verifier: Arc::new(ResolvingVerifier::new()),
            time_source: Arc::new(FixedTimeSource::new(1_000)),
            config,
        });

        Self {
            notary_key,
            alice: KeyPair::from_seed([12; 32]),
            backend,
            service,
        }
    }

    fn request(&self) -> NotarisationRequest {
        let tx = WireTransaction {
            inputs: vec![StateRef::new(TransactionId([0xA; 32]), 0)],
            outputs: vec![b"bond".to_vec()],
            commands: vec![b"redeem".to_vec()],
            required_signers: vec![self.alice.public_key()],
            time_window: None,
            notary: self.service.notary().clone(),
        };
        let sig = TransactionSignature {
            by: self.alice.public_key(),
            bytes: self.alice.sign(tx.id().as_bytes()),
        };
        NotarisationRequest::new(SignedTransaction::new(tx, vec![sig]), vec![])
    }

    /// Send `message` from the requester, run the flow, return the reply.
    async fn exchange(&self, message: NotaryEnvelope) -> (FlowReport, NotaryEnvelope) {
        let (mut client, notary): (InMemorySession, InMemorySession) =
            session_pair("Alice", "Notary");
        client.send(message).await.unwrap();
        let report = self.service.handle(notary).await.unwrap();
        let reply = client.receive().await.unwrap();
        (report, reply)
    }
}

fn envelope(request: NotarisationRequest) -> NotaryEnvelope {
    NotaryEnvelope::new(Uuid::new_v4(), 1_000, NotaryMessage::Request(request))
}

fn rejection(reply: NotaryEnvelope) -> NotaryError {
    match reply.into_payload() {
        NotaryMessage::Response(NotarisationResponse::Rejected(e)) => e,
        other => panic!("expected rejection, got {}", other.label()),
    }
}

#[tokio::test]
async fn test_committed_flow_signs_transaction_id() {
    let f = Fixture::new(MockBackend::accepting());
    let request = f.request();
    let sent = envelope(request.clone());
    let correlation = sent.correlation_id;

    let (report, reply) = f.exchange(sent).await;

    assert_eq!(reply.correlation_id, correlation);
    let NotaryMessage::Response(NotarisationResponse::Signed { tx_id, signature }) =
        reply.into_payload()
    else {
        panic!("expected signature");
    };
    assert_eq!(tx_id, request.tx_id);
    assert_eq!(signature.by, f.notary_key.public_key());
    assert!(is_valid_signature(&signature.by, tx_id.as_bytes(), &signature.bytes));
    assert_eq!(
        report.states,
        vec![
            FlowState::AwaitingRequest,
            FlowState::Validating,
            FlowState::RequestingCommit,
            FlowState::Committed,
            FlowState::Done,
        ]
    );
    assert!(report.committed());
}

#[tokio::test]
async fn test_invalid_signature_never_reaches_backend() {
    let f = Fixture::new(MockBackend::accepting());
    let mut request = f.request();
    request.transaction.sigs[0].bytes[10] ^= 0xFF;

    let (report, reply) = f.exchange(envelope(request)).await;

    assert_eq!(rejection(reply).kind(), "signatures_invalid");
    assert_eq!(f.backend.calls(), 0);
    assert_eq!(
        report.states,
        vec![
            FlowState::AwaitingRequest,
            FlowState::Validating,
            FlowState::Rejected,
            FlowState::Done,
        ]
    );
}

#[tokio::test]
async fn test_conflict_reported_with_consumers() {
    let mut consumed = ConflictSet::new();
    consumed.insert(StateRef::new(TransactionId([0xA; 32]), 0), TransactionId([0xB; 32]));
    let f = Fixture::new(MockBackend::returning(Err(CommitError::Conflict(consumed.clone()))));
    let request = f.request();

    let (report, reply) = f.exchange(envelope(request.clone())).await;

    assert_eq!(
        rejection(reply),
        NotaryError::Conflict {
            tx_id: request.tx_id,
            consumed
        }
    );
    assert_eq!(report.states[3], FlowState::Rejected);
}

#[tokio::test]
async fn test_unavailable_cluster_is_general() {
    let f = Fixture::new(MockBackend::returning(Err(CommitError::TransientUnavailable {
        attempts: 2,
        reason: "No decision within 10ms".into(),
    })));

    let (_, reply) = f.exchange(envelope(f.request())).await;

    assert_eq!(rejection(reply).kind(), "general");
    assert_eq!(f.backend.calls(), 1);
}

#[tokio::test]
async fn test_unsupported_version_rejected() {
    let f = Fixture::new(MockBackend::accepting());
    let mut sent = envelope(f.request());
    sent.version = 7;

    let (report, reply) = f.exchange(sent).await;

    assert_eq!(reply.version, NotaryEnvelope::CURRENT_VERSION);
    assert_eq!(rejection(reply).kind(), "general");
    assert_eq!(f.backend.calls(), 0);
    assert_eq!(report.tx_id, None);
}

#[tokio::test]
async fn test_response_instead_of_request_rejected() {
    let f = Fixture::new(MockBackend::accepting());
    let bogus = NotaryEnvelope::new(
        Uuid::new_v4(),
        0,
        NotaryMessage::Response(NotarisationResponse::Rejected(NotaryError::General("?".into()))),
    );

    let (_, reply) = f.exchange(bogus).await;

    assert_eq!(rejection(reply).kind(), "general");
}

#[tokio::test]
async fn test_silent_requester_times_out() {
    let f = Fixture::new(MockBackend::accepting());
    let (_client, notary) = session_pair("Alice", "Notary");

    let err = f.service.handle(notary).await.unwrap_err();

    assert!(matches!(err, ServiceError::Session(SessionError::Timeout { .. })));
}

#[tokio::test]
async fn test_serve_handles_sessions_until_endpoints_dropped() {
    let f = Fixture::new(MockBackend::accepting());
    let (endpoint, listener) = NotaryEndpoint::new("Notary");
    let service = Arc::new(f.service);
    let server = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.serve(listener).await })
    };

    let request = {
        let tx = WireTransaction {
            inputs: vec![],
            outputs: vec![b"issued".to_vec()],
            commands: vec![b"issue".to_vec()],
            required_signers: vec![],
            time_window: None,
            notary: service.notary().clone(),
        };
        NotarisationRequest::new(SignedTransaction::new(tx, vec![]), vec![])
    };

    for _ in 0..3 {
        let mut session = endpoint.connect("Alice").await.unwrap();
        session.send(envelope(request.clone())).await.unwrap();
        let reply = session.receive().await.unwrap();
        assert!(matches!(
            reply.into_payload(),
            NotaryMessage::Response(NotarisationResponse::Signed { .. })
        ));
    }
    drop(endpoint);

    assert_eq!(server.await.unwrap(), 3);
    assert_eq!(f.backend.calls(), 3);
}
