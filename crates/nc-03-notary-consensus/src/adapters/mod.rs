//! Consensus backend adapters.

pub mod ledger_state_machine;
pub mod replicated;
pub mod single_authority;

pub use ledger_state_machine::LedgerStateMachine;
pub use replicated::ReplicatedClusterBackend;
pub use single_authority::SingleAuthorityBackend;
