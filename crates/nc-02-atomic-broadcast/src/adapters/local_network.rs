//! # In-Process Cluster Network
//!
//! One unbounded inbox per replica. The network stamps each envelope with the
//! sending replica's id, so a replica cannot claim another's link. Links can
//! be cut to simulate partitions.

use crate::error::TransportError;
use crate::messages::{ReplicaId, SignedMessage};
use crate::ports::ClusterTransport;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// A message together with the link it arrived on.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: ReplicaId,
    pub message: SignedMessage,
}

pub struct LocalNetwork {
    inboxes: Vec<mpsc::UnboundedSender<Envelope>>,
    /// Directed links currently down.
    cut: RwLock<BTreeSet<(ReplicaId, ReplicaId)>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LocalNetwork {
    /// Create a network for `size` replicas and return each replica's inbox.
    pub fn new(size: usize) -> (Arc<Self>, Vec<mpsc::UnboundedReceiver<Envelope>>) {
        let (inboxes, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::unbounded_channel()).unzip();
        let network = Arc::new(Self {
            inboxes,
            cut: RwLock::new(BTreeSet::new()),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });
        (network, receivers)
    }

    pub fn size(&self) -> usize {
        self.inboxes.len()
    }

    /// Transport sending on behalf of `replica`.
    pub fn transport(self: &Arc<Self>, replica: ReplicaId) -> LocalTransport {
        LocalTransport {
            local: replica,
            network: Arc::clone(self),
        }
    }

    /// Cut both directions between `a` and `b`.
    pub fn cut_link(&self, a: ReplicaId, b: ReplicaId) {
        let mut cut = self.cut.write();
        cut.insert((a, b));
        cut.insert((b, a));
    }

    /// Cut every link to and from `replica`.
    pub fn isolate(&self, replica: ReplicaId) {
        for other in 0..self.size() as ReplicaId {
            if other != replica {
                self.cut_link(replica, other);
            }
        }
    }

    /// Restore every link.
    pub fn heal(&self) {
        self.cut.write().clear();
    }

    pub fn messages_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn route(
        &self,
        from: ReplicaId,
        to: ReplicaId,
        message: SignedMessage,
    ) -> Result<(), TransportError> {
        let inbox = self
            .inboxes
            .get(to as usize)
            .ok_or(TransportError::UnknownDestination(to))?;

        if self.cut.read().contains(&(from, to)) {
            trace!(from, to, kind = message.body.label(), "Link down; dropping");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        inbox
            .send(Envelope { from, message })
            .map_err(|_| TransportError::Closed(to))?;
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A replica's sending half of the [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalTransport {
    local: ReplicaId,
    network: Arc<LocalNetwork>,
}

#[async_trait]
impl ClusterTransport for LocalTransport {
    fn local_id(&self) -> ReplicaId {
        self.local
    }

    async fn send(&self, to: ReplicaId, message: SignedMessage) -> Result<(), TransportError> {
        self.network.route(self.local, to, message)
    }
}
