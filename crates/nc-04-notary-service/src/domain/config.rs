use shared_types::Party;
use std::time::Duration;

/// Configuration of a notary service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryServiceConfig {
    /// The notary identity transactions must name.
    pub notary: Party,
    /// Resolve dependencies and verify contracts before committing.
    pub validating: bool,
    /// How long a flow waits for the request after a session opens.
    pub receive_timeout: Duration,
}

impl NotaryServiceConfig {
    pub fn new(notary: Party, validating: bool) -> Self {
        Self {
            notary,
            validating,
            receive_timeout: Duration::from_secs(30),
        }
    }
}
