//! Notary service: builds the flow from its collaborators and serves every
//! session accepted on a listener as an independent task.

pub mod flow;

pub use flow::{FlowReport, NotaryServiceFlow};

use crate::domain::{NotaryServiceConfig, ServiceResult};
use crate::ports::{KeyService, TimeSource, TransactionVerifier, UniquenessProvider};
use crate::validation::{
    NonValidatingPolicy, TransactionValidator, ValidatingPolicy, ValidationPolicy,
};
use shared_bus::{FlowSession, SessionListener};
use shared_types::Party;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Collaborators of a [`NotaryService`].
pub struct NotaryServiceDependencies {
    pub backend: Arc<dyn UniquenessProvider>,
    pub keys: Arc<dyn KeyService>,
    pub verifier: Arc<dyn TransactionVerifier>,
    pub time_source: Arc<dyn TimeSource>,
    pub config: NotaryServiceConfig,
}

pub struct NotaryService {
    config: NotaryServiceConfig,
    flow: Arc<NotaryServiceFlow>,
}

impl NotaryService {
    pub fn new(deps: NotaryServiceDependencies) -> Self {
        let policy: Arc<dyn ValidationPolicy> = if deps.config.validating {
            Arc::new(ValidatingPolicy::new(deps.verifier))
        } else {
            Arc::new(NonValidatingPolicy)
        };
        let validator = TransactionValidator::new(
            deps.config.notary.clone(),
            policy,
            Arc::clone(&deps.keys),
            Arc::clone(&deps.time_source),
        );
        let flow = NotaryServiceFlow::new(
            validator,
            deps.backend,
            deps.keys,
            deps.time_source,
            deps.config.receive_timeout,
        );

        Self {
            config: deps.config,
            flow: Arc::new(flow),
        }
    }

    pub fn notary(&self) -> &Party {
        &self.config.notary
    }

    pub fn config(&self) -> &NotaryServiceConfig {
        &self.config
    }

    /// Serve a single session on the calling task.
    pub async fn handle<S: FlowSession>(&self, mut session: S) -> ServiceResult<FlowReport> {
        self.flow.run(&mut session).await
    }

    /// Accept sessions until every endpoint is dropped, then wait for the
    /// flows still running. Returns the number of sessions served.
    pub async fn serve(&self, listener: SessionListener) -> usize {
        self.serve_until(listener, std::future::pending()).await
    }

    /// Like [`NotaryService::serve`], but also stops accepting once
    /// `shutdown` completes. Sessions already queued are still served.
    pub async fn serve_until<F>(&self, mut listener: SessionListener, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        info!(
            notary = %self.config.notary,
            policy = self.flow.validator().policy_name(),
            "Notary service accepting sessions"
        );
        tokio::pin!(shutdown);

        let mut flows = JoinSet::new();
        let mut served = 0;
        let mut closing = false;
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Some(mut session) => {
                        let flow = Arc::clone(&self.flow);
                        flows.spawn(async move { flow.run(&mut session).await });
                    }
                    None => break,
                },
                Some(joined) = flows.join_next() => {
                    served += 1;
                    log_finished(joined);
                }
                _ = &mut shutdown, if !closing => {
                    info!(notary = %self.config.notary, "Shutdown requested; no new sessions");
                    closing = true;
                    listener.close();
                }
            }
        }

        while let Some(joined) = flows.join_next().await {
            served += 1;
            log_finished(joined);
        }
        info!(notary = %self.config.notary, served, "Notary service stopped");
        served
    }
}

fn log_finished(joined: Result<ServiceResult<FlowReport>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "Flow ended without a response"),
        Err(e) => error!(error = %e, "Flow task failed"),
    }
}
