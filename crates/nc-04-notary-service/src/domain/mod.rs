//! Domain types for the notary service.

pub mod config;
pub mod errors;
pub mod flow_state;

pub use config::NotaryServiceConfig;
pub use errors::{ServiceError, ServiceResult};
pub use flow_state::FlowState;
