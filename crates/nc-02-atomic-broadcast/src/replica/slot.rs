use crate::messages::{ProtocolMessage, ReplicaId, Request, SignedMessage, ViewNumber};
use shared_crypto::Digest;
use std::collections::BTreeMap;

/// The request accepted for a sequence number in the slot's view.
#[derive(Debug, Clone)]
pub(super) struct Accepted {
    pub digest: Digest,
    pub request: Option<Request>,
}

/// Agreement progress for one sequence number within one view.
#[derive(Debug)]
pub(super) struct Slot {
    pub view: ViewNumber,
    pub accepted: Option<Accepted>,
    /// First prepare received from each replica, kept signed for certificates.
    pub prepares: BTreeMap<ReplicaId, SignedMessage>,
    /// First commit digest received from each replica.
    pub commits: BTreeMap<ReplicaId, Digest>,
    pub prepared: bool,
    pub committed: bool,
}

impl Slot {
    pub fn new(view: ViewNumber) -> Self {
        Self {
            view,
            accepted: None,
            prepares: BTreeMap::new(),
            commits: BTreeMap::new(),
            prepared: false,
            committed: false,
        }
    }

    /// Discard progress from an earlier view.
    pub fn advance_to(&mut self, view: ViewNumber) {
        if self.view < view {
            *self = Slot::new(view);
        }
    }

    /// Prepares matching the accepted digest.
    pub fn matching_prepares(&self) -> Vec<SignedMessage> {
        let Some(accepted) = &self.accepted else {
            return Vec::new();
        };
        self.prepares
            .values()
            .filter(|m| {
                matches!(&m.body, ProtocolMessage::Prepare(v) if v.digest == accepted.digest)
            })
            .cloned()
            .collect()
    }

    /// Number of commits matching the accepted digest.
    pub fn matching_commits(&self) -> usize {
        match &self.accepted {
            Some(accepted) => self.commits.values().filter(|d| **d == accepted.digest).count(),
            None => 0,
        }
    }
}
