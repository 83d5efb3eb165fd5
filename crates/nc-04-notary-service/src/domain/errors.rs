use shared_bus::SessionError;
use thiserror::Error;

/// Failures that end a flow without a response reaching the requester.
///
/// Everything the requester can be told about is a
/// [`NotaryError`](shared_types::NotaryError) sent on the session instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Session failure: {0}")]
    Session(#[from] SessionError),

    #[error("Illegal flow transition {from} -> {to}")]
    IllegalTransition { from: &'static str, to: &'static str },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
