//! Opens a session per request against a notary endpoint.

use crate::flow::NotaryClientFlow;
use shared_bus::NotaryEndpoint;
use shared_types::{NotaryError, SignedTransaction};

#[derive(Debug, Clone)]
pub struct NotaryClient {
    requester: String,
    endpoint: NotaryEndpoint,
    flow: NotaryClientFlow,
}

impl NotaryClient {
    pub fn new(
        requester: impl Into<String>,
        endpoint: NotaryEndpoint,
        flow: NotaryClientFlow,
    ) -> Self {
        Self {
            requester: requester.into(),
            endpoint,
            flow,
        }
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Notarise `transaction` in a fresh session.
    pub async fn notarize(
        &self,
        transaction: SignedTransaction,
        dependencies: Vec<SignedTransaction>,
    ) -> Result<SignedTransaction, NotaryError> {
        let mut session = self
            .endpoint
            .connect(&self.requester)
            .await
            .map_err(|e| NotaryError::General(e.to_string()))?;
        self.flow.notarize(&mut session, transaction, dependencies).await
    }
}
