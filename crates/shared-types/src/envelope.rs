//! # `SessionEnvelope`
//!
//! The wrapper for every message exchanged on a notarisation session.
//!
//! ## Properties
//!
//! - **Versioning**: every envelope carries the protocol version; receivers
//!   reject versions they do not speak.
//! - **Correlation**: a flow stamps all of its messages with one
//!   `correlation_id`; responses must echo it.

use crate::errors::MessageError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope around a session payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope<T> {
    /// Protocol version for forward compatibility.
    pub version: u16,

    /// Identifies the flow instance this message belongs to.
    pub correlation_id: Uuid,

    /// Unix seconds at which the sender created the message.
    pub timestamp: u64,

    /// The actual message payload.
    pub payload: T,
}

impl<T> SessionEnvelope<T> {
    /// Current protocol version.
    pub const CURRENT_VERSION: u16 = 1;

    /// Wrap `payload` for the flow identified by `correlation_id`.
    pub fn new(correlation_id: Uuid, timestamp: u64, payload: T) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            correlation_id,
            timestamp,
            payload,
        }
    }

    /// Wrap a response to `request`, echoing its correlation id.
    pub fn reply_to<R>(request: &SessionEnvelope<R>, timestamp: u64, payload: T) -> Self {
        Self::new(request.correlation_id, timestamp, payload)
    }

    /// Check the version and, when given, the expected correlation id.
    pub fn check(&self, expected_correlation: Option<Uuid>) -> Result<(), MessageError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(MessageError::UnsupportedVersion {
                received: self.version,
                supported: Self::CURRENT_VERSION,
            });
        }
        if let Some(expected) = expected_correlation {
            if expected != self.correlation_id {
                return Err(MessageError::CorrelationMismatch {
                    expected: expected.to_string(),
                    received: self.correlation_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Unwrap the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }
}
