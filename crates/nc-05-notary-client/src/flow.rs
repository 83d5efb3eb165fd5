//! # Requesting Flow
//!
//! Sends one transaction to its notary over an open session and waits for
//! the answer. A signature is accepted only if it was made by the notary the
//! transaction names, over the transaction's id. No retry happens here; a
//! requester that receives a transient failure starts a new flow.

use shared_bus::{FlowSession, NotaryEnvelope, SessionError};
use shared_crypto::is_valid_signature;
use shared_types::{
    short_hex, NotarisationRequest, NotarisationResponse, NotaryError, NotaryMessage,
    SignedTransaction, TransactionSignature,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryClientFlow {
    /// Send dependencies with the request, for validating notaries.
    validating: bool,
    response_timeout: Option<Duration>,
}

impl NotaryClientFlow {
    pub fn new(validating: bool) -> Self {
        Self {
            validating,
            response_timeout: None,
        }
    }

    /// Give up waiting for the notary after `limit`.
    pub fn with_response_timeout(mut self, limit: Duration) -> Self {
        self.response_timeout = Some(limit);
        self
    }

    /// Obtain the notary's signature and return `transaction` with it attached.
    pub async fn notarize<S>(
        &self,
        session: &mut S,
        transaction: SignedTransaction,
        dependencies: Vec<SignedTransaction>,
    ) -> Result<SignedTransaction, NotaryError>
    where
        S: FlowSession + ?Sized,
    {
        let signature = self
            .request_signature(session, transaction.clone(), dependencies)
            .await?;
        Ok(transaction.with_signature(signature))
    }

    /// Obtain the notary's signature over `transaction`'s id.
    pub async fn request_signature<S>(
        &self,
        session: &mut S,
        transaction: SignedTransaction,
        dependencies: Vec<SignedTransaction>,
    ) -> Result<TransactionSignature, NotaryError>
    where
        S: FlowSession + ?Sized,
    {
        let notary = transaction.tx.notary.clone();
        let dependencies = if self.validating { dependencies } else { Vec::new() };
        let request = NotarisationRequest::new(transaction, dependencies);
        let tx_id = request.tx_id;

        let correlation = Uuid::new_v4();
        let message = NotaryMessage::Request(request);
        let envelope = NotaryEnvelope::new(correlation, unix_now(), message);
        debug!(
            tx_id = %tx_id,
            notary = %notary,
            session = %session.session_id(),
            "Requesting notarisation"
        );
        session.send(envelope).await.map_err(session_failure)?;

        let reply = match self.response_timeout {
            Some(limit) => session.receive_within(limit).await,
            None => session.receive().await,
        }
        .map_err(session_failure)?;

        reply
            .check(Some(correlation))
            .map_err(|e| NotaryError::General(format!("invalid response: {e}")))?;

        match reply.into_payload() {
            NotaryMessage::Response(NotarisationResponse::Signed {
                tx_id: signed_id,
                signature,
            }) => {
                if signed_id != tx_id {
                    warn!(
                        tx_id = %tx_id,
                        signed = %signed_id,
                        "Notary signed a different transaction"
                    );
                    return Err(NotaryError::General(format!(
                        "notary signed {signed_id} instead of {tx_id}"
                    )));
                }
                if signature.by != notary.owning_key
                    || !is_valid_signature(&signature.by, tx_id.as_bytes(), &signature.bytes)
                {
                    warn!(
                        tx_id = %tx_id,
                        signer = %short_hex(&signature.by),
                        "Invalid notary signature"
                    );
                    return Err(NotaryError::General(format!(
                        "response not signed by notary {notary}"
                    )));
                }
                info!(tx_id = %tx_id, notary = %notary, "Transaction notarised");
                Ok(signature)
            }
            NotaryMessage::Response(NotarisationResponse::Rejected(error)) => {
                warn!(tx_id = %tx_id, kind = error.kind(), error = %error, "Notarisation refused");
                Err(error)
            }
            NotaryMessage::Request(_) => Err(NotaryError::General(
                "notary answered with a request".into(),
            )),
        }
    }
}

fn session_failure(e: SessionError) -> NotaryError {
    warn!(error = %e, "Notary session failed");
    NotaryError::General(e.to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
