//! # Replica Runner
//!
//! Drives one [`Replica`] from a tokio task: inbound envelopes, local
//! submissions and a timer tick are multiplexed with `select!`, and the
//! replica's actions are carried out through the outbound policy and the
//! cluster transport.

use crate::adapters::local_network::Envelope;
use crate::config::BroadcastConfig;
use crate::error::{BroadcastError, BroadcastResult};
use crate::messages::{ReplicaId, SignedMessage};
use crate::ports::{ClusterTransport, OutboundPolicy};
use crate::replica::{Action, Decision, Replica, ReplicaStatus};
use rand::Rng;
use shared_crypto::{Digest, KeyPair};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Commands from handles to the runner task.
enum Command {
    Submit {
        payload: Vec<u8>,
        reply: oneshot::Sender<Decision>,
    },
    Status(oneshot::Sender<ReplicaStatus>),
}

/// Cloneable handle for submitting payloads through one replica.
#[derive(Clone)]
pub struct BroadcastHandle {
    replica: ReplicaId,
    commands: mpsc::Sender<Command>,
    request_timeout: Duration,
    expose_races: bool,
}

impl BroadcastHandle {
    pub fn replica_id(&self) -> ReplicaId {
        self.replica
    }

    /// Order `payload` across the cluster and wait for a quorum decision.
    pub async fn submit(&self, payload: Vec<u8>) -> BroadcastResult<Decision> {
        self.submit_within(payload, self.request_timeout).await
    }

    /// [`BroadcastHandle::submit`] with an explicit timeout.
    pub async fn submit_within(
        &self,
        payload: Vec<u8>,
        limit: Duration,
    ) -> BroadcastResult<Decision> {
        if self.expose_races {
            let delay = rand::thread_rng().gen_range(0..25);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let (reply, decided) = oneshot::channel();
        self.commands
            .send(Command::Submit { payload, reply })
            .await
            .map_err(|_| BroadcastError::Stopped)?;

        match tokio::time::timeout(limit, decided).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(_)) => Err(BroadcastError::Stopped),
            Err(_) => Err(BroadcastError::Timeout {
                waited_ms: limit.as_millis() as u64,
            }),
        }
    }

    /// Current progress of the replica.
    pub async fn status(&self) -> BroadcastResult<ReplicaStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Status(tx))
            .await
            .map_err(|_| BroadcastError::Stopped)?;
        rx.await.map_err(|_| BroadcastError::Stopped)
    }
}

/// Spawn the task driving `replica`.
///
/// The task ends when every handle has been dropped.
pub fn spawn_replica(
    replica: Replica,
    keypair: KeyPair,
    config: &BroadcastConfig,
    transport: Arc<dyn ClusterTransport>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    policy: Arc<dyn OutboundPolicy>,
) -> (BroadcastHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(256);
    let handle = BroadcastHandle {
        replica: replica.id(),
        commands: commands_tx,
        request_timeout: config.request_timeout,
        expose_races: config.expose_races,
    };

    let runner = Runner {
        replica,
        keypair,
        transport,
        policy,
        waiters: HashMap::new(),
    };
    let task = tokio::spawn(runner.run(commands_rx, inbound, config.tick_interval()));
    (handle, task)
}

struct Runner {
    replica: Replica,
    keypair: KeyPair,
    transport: Arc<dyn ClusterTransport>,
    policy: Arc<dyn OutboundPolicy>,
    waiters: HashMap<Digest, Vec<oneshot::Sender<Decision>>>,
}

impl Runner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        tick_interval: Duration,
    ) {
        let id = self.replica.id();
        info!(replica = id, "Replica started");

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { payload, reply }) => {
                        self.prune_abandoned();
                        let (key, actions) =
                            self.replica.submit(payload, unix_now(), Instant::now());
                        self.waiters.entry(key).or_default().push(reply);
                        self.perform(actions).await;
                    }
                    Some(Command::Status(reply)) => {
                        let _ = reply.send(self.replica.status());
                    }
                    None => break,
                },
                Some(envelope) = inbound.recv() => {
                    let actions =
                        self.replica
                            .handle_message(envelope.from, envelope.message, Instant::now());
                    self.perform(actions).await;
                }
                _ = ticker.tick() => {
                    let actions = self.replica.tick(Instant::now());
                    self.perform(actions).await;
                }
            }
        }

        info!(replica = id, "Replica stopped");
    }

    async fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send { to, message } => self.send(to, message).await,
                Action::Broadcast(message) => {
                    let local = self.replica.id();
                    let peers: Vec<ReplicaId> = self
                        .replica
                        .membership()
                        .replicas()
                        .filter(|peer| *peer != local)
                        .collect();
                    for peer in peers {
                        self.send(peer, message.clone()).await;
                    }
                }
                Action::Decided(decision) => {
                    let waiters = self.waiters.remove(&decision.key).unwrap_or_default();
                    debug!(
                        replica = self.replica.id(),
                        seq = decision.seq,
                        waiters = waiters.len(),
                        "Resolving decision"
                    );
                    for waiter in waiters {
                        let _ = waiter.send(decision.clone());
                    }
                }
            }
        }
    }

    async fn send(&mut self, to: ReplicaId, message: SignedMessage) {
        let Some(message) = self.policy.outbound(to, message, &self.keypair) else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        if let Err(e) = transport.send(to, message).await {
            warn!(replica = self.replica.id(), to, error = %e, "Send failed");
        }
    }

    /// Drop waiters whose submitters gave up and stop collecting their replies.
    fn prune_abandoned(&mut self) {
        let replica = &mut self.replica;
        self.waiters.retain(|key, senders| {
            senders.retain(|s| !s.is_closed());
            if senders.is_empty() {
                replica.forget(key);
                false
            } else {
                true
            }
        });
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
