//! Adapters for the broadcast ports.

pub mod local_network;
pub mod policies;

pub use local_network::{Envelope, LocalNetwork, LocalTransport};
pub use policies::{
    EquivocatingPolicy, HonestPolicy, RenumberingPolicy, RestampingPolicy, SilentPolicy,
};
