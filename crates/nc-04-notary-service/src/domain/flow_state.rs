//! States of one notary service flow.

use std::fmt;

/// ```text
/// AwaitingRequest ─→ Validating ─→ RequestingCommit ─→ Committed ─┐
///        │               │                 │                      ├─→ Done
///        │               └─────────────────┴──────→ Rejected ─────┘
///        └────────────────────────────────────────→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    AwaitingRequest,
    Validating,
    RequestingCommit,
    Committed,
    Rejected,
    Done,
}

impl FlowState {
    /// Whether the flow may move from `self` to `next`.
    pub fn can_transition_to(self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (AwaitingRequest, Validating)
                | (AwaitingRequest, Rejected)
                | (AwaitingRequest, Done)
                | (Validating, RequestingCommit)
                | (Validating, Rejected)
                | (RequestingCommit, Committed)
                | (RequestingCommit, Rejected)
                | (Committed, Done)
                | (Rejected, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == FlowState::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowState::AwaitingRequest => "awaiting_request",
            FlowState::Validating => "validating",
            FlowState::RequestingCommit => "requesting_commit",
            FlowState::Committed => "committed",
            FlowState::Rejected => "rejected",
            FlowState::Done => "done",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
