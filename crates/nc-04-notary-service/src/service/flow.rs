//! # Notary Service Flow
//!
//! Handles one notarisation session: receive the request, validate it,
//! commit it through the consensus backend, and answer with either the
//! notary's signature or a [`NotaryError`].
//!
//! Validation and signature checks finish before the backend is called, so
//! nothing invalid reaches the ledger.

use crate::domain::{FlowState, ServiceError, ServiceResult};
use crate::metrics;
use crate::ports::{KeyService, TimeSource, UniquenessProvider};
use crate::validation::TransactionValidator;
use shared_bus::{FlowSession, NotaryEnvelope};
use shared_types::{
    NotarisationResponse, NotaryError, NotaryMessage, TransactionId, TransactionParts,
    TransactionSignature,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened on one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    pub session: Uuid,
    /// Id of the requested transaction, once known.
    pub tx_id: Option<TransactionId>,
    /// States visited, starting with `AwaitingRequest` and ending with `Done`.
    pub states: Vec<FlowState>,
    /// The response sent to the requester.
    pub outcome: Result<TransactionSignature, NotaryError>,
}

impl FlowReport {
    pub fn committed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Records the state sequence and refuses transitions the flow may not take.
struct Transitions {
    session: Uuid,
    states: Vec<FlowState>,
}

impl Transitions {
    fn new(session: Uuid) -> Self {
        Self {
            session,
            states: vec![FlowState::AwaitingRequest],
        }
    }

    fn current(&self) -> FlowState {
        self.states.last().copied().unwrap_or(FlowState::AwaitingRequest)
    }

    fn advance(&mut self, next: FlowState) -> ServiceResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(ServiceError::IllegalTransition {
                from: current.as_str(),
                to: next.as_str(),
            });
        }
        debug!(session = %self.session, from = %current, to = %next, "Flow transition");
        self.states.push(next);
        Ok(())
    }
}

pub struct NotaryServiceFlow {
    validator: TransactionValidator,
    backend: Arc<dyn UniquenessProvider>,
    keys: Arc<dyn KeyService>,
    time_source: Arc<dyn TimeSource>,
    receive_timeout: Duration,
}

impl NotaryServiceFlow {
    pub fn new(
        validator: TransactionValidator,
        backend: Arc<dyn UniquenessProvider>,
        keys: Arc<dyn KeyService>,
        time_source: Arc<dyn TimeSource>,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            backend,
            keys,
            time_source,
            receive_timeout,
        }
    }

    pub fn validator(&self) -> &TransactionValidator {
        &self.validator
    }

    /// Serve one session to completion.
    ///
    /// Returns an error only when the session itself fails; refusals are
    /// sent to the requester and reported in [`FlowReport::outcome`].
    pub async fn run<S>(&self, session: &mut S) -> ServiceResult<FlowReport>
    where
        S: FlowSession + ?Sized,
    {
        let mut transitions = Transitions::new(session.session_id());

        let envelope = match session.receive_within(self.receive_timeout).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    session = %session.session_id(),
                    counterparty = session.counterparty(),
                    error = %e,
                    "No request received"
                );
                transitions.advance(FlowState::Done)?;
                return Err(e.into());
            }
        };
        let started = Instant::now();

        let (tx_id, outcome) = self.process(&envelope, &mut transitions).await?;

        let response = match (&outcome, tx_id) {
            (Ok(signature), Some(tx_id)) => NotarisationResponse::Signed {
                tx_id,
                signature: signature.clone(),
            },
            (Err(e), _) => NotarisationResponse::Rejected(e.clone()),
            (Ok(_), None) => NotarisationResponse::Rejected(NotaryError::General(
                "signed without a transaction id".into(),
            )),
        };
        let reply = NotaryEnvelope::reply_to(
            &envelope,
            self.time_source.now(),
            NotaryMessage::Response(response),
        );
        session.send(reply).await?;
        transitions.advance(FlowState::Done)?;

        metrics::record_flow_latency(started.elapsed().as_secs_f64());
        match &outcome {
            Ok(_) => metrics::record_committed(),
            Err(e) => metrics::record_rejected(e.kind()),
        }

        Ok(FlowReport {
            session: transitions.session,
            tx_id,
            states: transitions.states,
            outcome,
        })
    }

    async fn process(
        &self,
        envelope: &NotaryEnvelope,
        transitions: &mut Transitions,
    ) -> ServiceResult<(Option<TransactionId>, Result<TransactionSignature, NotaryError>)> {
        if let Err(e) = envelope.check(None) {
            warn!(session = %transitions.session, error = %e, "Refusing envelope");
            transitions.advance(FlowState::Rejected)?;
            return Ok((None, Err(NotaryError::General(e.to_string()))));
        }

        let NotaryMessage::Request(request) = &envelope.payload else {
            let label = envelope.payload.label();
            warn!(session = %transitions.session, kind = label, "Expected a notarisation request");
            transitions.advance(FlowState::Rejected)?;
            return Ok((None, Err(NotaryError::General(format!("unexpected message: {label}")))));
        };
        let claimed = request.tx_id;

        transitions.advance(FlowState::Validating)?;
        let parts = match self.validator.validate(request).await {
            Ok(parts) => parts,
            Err(e) => {
                warn!(tx_id = %claimed, kind = e.kind(), error = %e, "Request rejected");
                transitions.advance(FlowState::Rejected)?;
                return Ok((Some(claimed), Err(e)));
            }
        };

        transitions.advance(FlowState::RequestingCommit)?;
        let outcome = self.commit(&parts).await;
        transitions.advance(match outcome {
            Ok(_) => FlowState::Committed,
            Err(_) => FlowState::Rejected,
        })?;
        Ok((Some(parts.id), outcome))
    }

    async fn commit(&self, parts: &TransactionParts) -> Result<TransactionSignature, NotaryError> {
        match self.backend.commit(parts).await {
            Ok(outcome) => {
                info!(
                    tx_id = %parts.id,
                    backend = self.backend.name(),
                    recorded = outcome.recorded,
                    replay = outcome.is_replay(),
                    "Transaction notarised"
                );
                Ok(TransactionSignature {
                    by: self.keys.public_key(),
                    bytes: self.keys.sign(parts.id.as_bytes()),
                })
            }
            Err(e) => {
                warn!(
                    tx_id = %parts.id,
                    backend = self.backend.name(),
                    error = %e,
                    "Commit refused"
                );
                Err(e.into_notary_error(parts.id))
            }
        }
    }
}
