//! # PBFT Replica
//!
//! A deterministic protocol state machine. It never performs I/O: callers
//! feed it inbound messages, local submissions and clock ticks, and it
//! returns the [`Action`]s to carry out.
//!
//! ## Normal case
//!
//! ```text
//! origin      primary          all replicas           all replicas      origin
//!   │ Request    │                   │                      │              │
//!   ├───────────►│ PrePrepare(v,s,d) │                      │              │
//!   │            ├──────────────────►│ Prepare(v,s,d)       │              │
//!   │            │                   ├─────────────────────►│ Commit       │
//!   │            │                   │   quorum prepares    │ quorum       │
//!   │            │                   │                      ├─ deliver ──► │ Reply
//!   │            │                   │                      │              │ quorum matching
//!   │◄───────────┴───────────────────┴──────────────────────┴──────────────┘ => Decided
//! ```
//!
//! ## View change
//!
//! A replica holding an undelivered request for longer than the view change
//! timeout broadcasts `ViewChange(v+1)` with its prepared certificates. A
//! replica that sees `f + 1` view changes for a higher view joins it. The new
//! primary broadcasts `NewView` carrying a quorum of view changes, and every
//! replica rebuilds the carried-over log from them.
//!
//! ## Log window
//!
//! Every checkpoint interval each replica broadcasts the digest of its
//! delivered log. A quorum of matching digests makes the checkpoint stable:
//! certificates at or below it are discarded and view changes start from it.
//! Sequence numbers are accepted only in `(last_delivered, low + window]`,
//! where the low watermark is the stable checkpoint, so a faulty primary or
//! backup cannot make a replica track arbitrary sequence numbers.

mod checkpoint;
mod slot;
mod view_change;


use crate::config::{BroadcastConfig, Membership};
use crate::error::{BroadcastError, BroadcastResult};
use crate::messages::{
    CheckpointCertificate, PrePrepare, PreparedCertificate, ProtocolMessage, ReplicaId, Reply,
    Request, SeqNumber, SignedMessage, ViewNumber, Vote, NULL_DIGEST,
};
use crate::ports::{Delivery, StateMachine};
use checkpoint::CheckpointVotes;
use shared_crypto::{Digest, KeyPair};
use shared_types::short_hex;
use slot::{Accepted, Slot};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use view_change::CarriedLog;

/// Messages for views not yet entered, or for sequence numbers just above
/// the log window, are held up to this many each.
const MAX_FUTURE_MESSAGES: usize = 4096;

/// Replies stay cached for this many log windows after delivery.
const REPLY_RETENTION_WINDOWS: SeqNumber = 4;

/// A request decided by a quorum of matching replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub seq: SeqNumber,
    /// [`Request::key`] of the decided request.
    pub key: Digest,
    pub result: Vec<u8>,
}

/// Work the replica asks its runner to perform.
#[derive(Debug, Clone)]
pub enum Action {
    Send { to: ReplicaId, message: SignedMessage },
    /// Send to every other member.
    Broadcast(SignedMessage),
    /// A locally submitted request was decided.
    Decided(Decision),
}

/// Snapshot of replica progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStatus {
    pub id: ReplicaId,
    pub view: ViewNumber,
    pub view_changing: bool,
    pub last_delivered: SeqNumber,
    /// Sequence number of the latest stable checkpoint.
    pub stable_checkpoint: SeqNumber,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Normal,
    ViewChanging { target: ViewNumber, deadline: Instant },
}

struct PendingRequest {
    request: Request,
    since: Instant,
}

struct CachedReply {
    seq: SeqNumber,
    result: Vec<u8>,
}

pub struct Replica {
    id: ReplicaId,
    keypair: KeyPair,
    membership: Membership,
    view_change_timeout: Duration,
    trace_messages: bool,
    checkpoint_interval: SeqNumber,
    log_window: SeqNumber,
    app: Box<dyn StateMachine>,

    view: ViewNumber,
    mode: Mode,
    announced: Option<ViewNumber>,
    next_seq: SeqNumber,
    /// Sequence numbers assigned in this view, by request key.
    assigned: HashMap<Digest, SeqNumber>,
    slots: BTreeMap<SeqNumber, Slot>,
    /// Certificates above the stable checkpoint.
    prepared_certs: BTreeMap<SeqNumber, PreparedCertificate>,
    last_delivered: SeqNumber,
    log_digest: Digest,
    stable: CheckpointCertificate,
    checkpoints: CheckpointVotes,
    /// Cached replies by request key, and the order they expire in.
    replies: HashMap<Digest, CachedReply>,
    reply_expiry: VecDeque<(SeqNumber, Digest)>,
    /// Undelivered requests by request key.
    pending: BTreeMap<Digest, PendingRequest>,
    /// Latest view change from each replica, by target view.
    view_changes: BTreeMap<ViewNumber, BTreeMap<ReplicaId, SignedMessage>>,
    /// First reply from each replica to our own outstanding requests.
    awaiting: HashMap<Digest, BTreeMap<ReplicaId, (SeqNumber, Vec<u8>)>>,
    future: Vec<SignedMessage>,
    ahead: Vec<SignedMessage>,

    loopback: VecDeque<SignedMessage>,
    actions: Vec<Action>,
}

impl Replica {
    /// Create replica `id`. `keypair` must match the membership entry.
    pub fn new(
        id: ReplicaId,
        keypair: KeyPair,
        membership: Membership,
        config: &BroadcastConfig,
        app: Box<dyn StateMachine>,
    ) -> BroadcastResult<Self> {
        let expected = membership.key(id).ok_or(BroadcastError::UnknownReplica(id))?;
        if *expected != keypair.public_key() {
            return Err(BroadcastError::KeyMismatch(id));
        }

        Ok(Self {
            id,
            keypair,
            membership,
            view_change_timeout: config.view_change_timeout,
            trace_messages: config.debug,
            checkpoint_interval: config.checkpoint_interval.max(1),
            log_window: config.log_window(),
            app,
            view: 0,
            mode: Mode::Normal,
            announced: None,
            next_seq: 0,
            assigned: HashMap::new(),
            slots: BTreeMap::new(),
            prepared_certs: BTreeMap::new(),
            last_delivered: 0,
            log_digest: NULL_DIGEST,
            stable: CheckpointCertificate::genesis(),
            checkpoints: CheckpointVotes::default(),
            replies: HashMap::new(),
            reply_expiry: VecDeque::new(),
            pending: BTreeMap::new(),
            view_changes: BTreeMap::new(),
            awaiting: HashMap::new(),
            future: Vec::new(),
            ahead: Vec::new(),
            loopback: VecDeque::new(),
            actions: Vec::new(),
        })
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn status(&self) -> ReplicaStatus {
        ReplicaStatus {
            id: self.id,
            view: self.view,
            view_changing: matches!(self.mode, Mode::ViewChanging { .. }),
            last_delivered: self.last_delivered,
            stable_checkpoint: self.stable.seq,
            pending: self.pending.len(),
        }
    }

    /// Submit `payload` for ordering. The returned request key identifies
    /// the [`Decision`] that will eventually be emitted.
    pub fn submit(
        &mut self,
        payload: Vec<u8>,
        timestamp: u64,
        now: Instant,
    ) -> (Digest, Vec<Action>) {
        let request = Request { payload, timestamp };
        let key = request.key();
        self.awaiting.entry(key).or_default();

        debug!(replica = self.id, key = %short_hex(&key), "Submitting request");
        self.broadcast(ProtocolMessage::Request(request));
        (key, self.drain(now))
    }

    /// Process a message that arrived on the link from `from`.
    pub fn handle_message(
        &mut self,
        from: ReplicaId,
        message: SignedMessage,
        now: Instant,
    ) -> Vec<Action> {
        if message.from != from {
            warn!(
                replica = self.id,
                link = from,
                claimed = message.from,
                "Dropping message with mismatched sender"
            );
            return Vec::new();
        }
        if !message.verify(&self.membership) {
            warn!(
                replica = self.id,
                from,
                kind = message.body.label(),
                "Dropping message with invalid signature"
            );
            return Vec::new();
        }
        self.dispatch(message, now);
        self.drain(now)
    }

    /// Advance timers.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        match self.mode {
            Mode::Normal => {
                let overdue = self
                    .pending
                    .values()
                    .any(|p| now.saturating_duration_since(p.since) >= self.view_change_timeout);
                if overdue {
                    warn!(
                        replica = self.id,
                        view = self.view,
                        primary = self.membership.primary(self.view),
                        pending = self.pending.len(),
                        "Request timer expired; suspecting primary"
                    );
                    self.start_view_change(self.view + 1, now);
                }
            }
            Mode::ViewChanging { target, deadline } => {
                if now >= deadline {
                    warn!(replica = self.id, target, "View change timed out");
                    self.start_view_change(target + 1, now);
                }
            }
        }
        self.drain(now)
    }

    /// Stop collecting replies for the request with `key`.
    pub fn forget(&mut self, key: &Digest) {
        self.awaiting.remove(key);
    }

    fn drain(&mut self, now: Instant) -> Vec<Action> {
        while let Some(message) = self.loopback.pop_front() {
            self.dispatch(message, now);
        }
        std::mem::take(&mut self.actions)
    }

    fn sign(&self, body: ProtocolMessage) -> Option<SignedMessage> {
        match SignedMessage::sign(self.id, body, &self.keypair) {
            Ok(message) => Some(message),
            Err(e) => {
                error!(replica = self.id, error = %e, "Failed to sign protocol message");
                None
            }
        }
    }

    fn broadcast(&mut self, body: ProtocolMessage) {
        if let Some(message) = self.sign(body) {
            if self.membership.size() > 1 {
                self.actions.push(Action::Broadcast(message.clone()));
            }
            self.loopback.push_back(message);
        }
    }

    fn send_to(&mut self, to: ReplicaId, body: ProtocolMessage) {
        if let Some(message) = self.sign(body) {
            if to == self.id {
                self.loopback.push_back(message);
            } else {
                self.actions.push(Action::Send { to, message });
            }
        }
    }

    fn dispatch(&mut self, message: SignedMessage, now: Instant) {
        if self.trace_messages {
            debug!(
                replica = self.id,
                from = message.from,
                kind = message.body.label(),
                view = self.view,
                "Protocol message"
            );
        }

        let from = message.from;
        match &message.body {
            ProtocolMessage::Request(request) => {
                let request = request.clone();
                self.on_request(from, request, now);
            }
            ProtocolMessage::PrePrepare(pre_prepare) => {
                if self.in_current_view(pre_prepare.view, &message)
                    && self.in_window(pre_prepare.seq, &message)
                {
                    let pre_prepare = pre_prepare.clone();
                    self.on_pre_prepare(from, pre_prepare, now);
                }
            }
            ProtocolMessage::Prepare(vote) => {
                let vote = *vote;
                if self.in_current_view(vote.view, &message) && self.in_window(vote.seq, &message) {
                    self.on_prepare(vote, message.clone(), now);
                }
            }
            ProtocolMessage::Commit(vote) => {
                let vote = *vote;
                if self.in_current_view(vote.view, &message) && self.in_window(vote.seq, &message) {
                    self.on_commit(from, vote, now);
                }
            }
            ProtocolMessage::Reply(reply) => {
                let reply = reply.clone();
                self.on_reply(from, reply);
            }
            ProtocolMessage::Checkpoint { seq, digest } => {
                let (seq, digest) = (*seq, *digest);
                self.on_checkpoint(message.clone(), seq, digest);
            }
            ProtocolMessage::ViewChange { .. } => self.on_view_change(message.clone(), now),
            ProtocolMessage::NewView { .. } => self.on_new_view(&message, now),
        }
    }

    /// Normal-case messages are processed only in the current view outside a
    /// view change; messages for later views are held until that view starts.
    fn in_current_view(&mut self, view: ViewNumber, message: &SignedMessage) -> bool {
        if view > self.view {
            if self.future.len() < MAX_FUTURE_MESSAGES {
                self.future.push(message.clone());
            } else {
                warn!(replica = self.id, view, "Future message buffer full; dropping");
            }
            return false;
        }
        view == self.view && matches!(self.mode, Mode::Normal)
    }

    /// The stable checkpoint, or the delivered prefix while it lags behind.
    fn low_watermark(&self) -> SeqNumber {
        self.stable.seq.min(self.last_delivered)
    }

    fn high_watermark(&self) -> SeqNumber {
        self.low_watermark().saturating_add(self.log_window)
    }

    /// Normal-case messages are processed only for undelivered sequence
    /// numbers up to the high watermark. Up to one more window is held until
    /// the next stable checkpoint; anything beyond is dropped.
    fn in_window(&mut self, seq: SeqNumber, message: &SignedMessage) -> bool {
        if seq <= self.last_delivered {
            return false;
        }
        let high = self.high_watermark();
        if seq <= high {
            return true;
        }
        if seq <= high.saturating_add(self.log_window) && self.ahead.len() < MAX_FUTURE_MESSAGES {
            self.ahead.push(message.clone());
        } else {
            warn!(
                replica = self.id,
                from = message.from,
                kind = message.body.label(),
                seq,
                high,
                "Dropping message outside the log window"
            );
        }
        false
    }

    // =========================================================================
    // NORMAL CASE
    // =========================================================================

    fn on_request(&mut self, from: ReplicaId, request: Request, now: Instant) {
        let key = request.key();
        if let Some(cached) = self.replies.get(&key) {
            let reply = Reply {
                seq: cached.seq,
                key,
                result: cached.result.clone(),
            };
            self.send_to(from, ProtocolMessage::Reply(reply));
            return;
        }

        self.pending
            .entry(key)
            .or_insert(PendingRequest { request, since: now });
        self.order_pending();
    }

    /// As primary, assign sequence numbers to known unassigned requests
    /// while the log window has room.
    fn order_pending(&mut self) {
        if !matches!(self.mode, Mode::Normal) || self.membership.primary(self.view) != self.id {
            return;
        }

        let high = self.high_watermark();
        let room = high.saturating_sub(self.next_seq);
        let unassigned: Vec<(Digest, Request)> = self
            .pending
            .iter()
            .filter(|(key, _)| !self.assigned.contains_key(*key))
            .take(usize::try_from(room).unwrap_or(usize::MAX))
            .map(|(key, p)| (*key, p.request.clone()))
            .collect();

        for (key, request) in unassigned {
            self.next_seq += 1;
            let seq = self.next_seq;
            let digest = request.digest();
            self.assigned.insert(key, seq);
            debug!(
                replica = self.id,
                view = self.view,
                seq,
                digest = %short_hex(&digest),
                "Assigning sequence number"
            );
            self.broadcast(ProtocolMessage::PrePrepare(PrePrepare {
                view: self.view,
                seq,
                digest,
                request: Some(request),
            }));
        }
    }

    fn on_pre_prepare(&mut self, from: ReplicaId, pre_prepare: PrePrepare, now: Instant) {
        if from != self.membership.primary(pre_prepare.view) {
            warn!(
                replica = self.id,
                from,
                view = pre_prepare.view,
                "Pre-prepare from non-primary"
            );
            return;
        }
        if !pre_prepare.is_well_formed() {
            warn!(
                replica = self.id,
                from,
                seq = pre_prepare.seq,
                "Pre-prepare digest does not match request"
            );
            return;
        }

        let PrePrepare { view, seq, digest, request } = pre_prepare;
        let slot = self.slots.entry(seq).or_insert_with(|| Slot::new(view));
        slot.advance_to(view);
        if slot.view != view {
            return;
        }
        if let Some(existing) = &slot.accepted {
            if existing.digest != digest {
                warn!(replica = self.id, view, seq, "Conflicting pre-prepare from primary");
            }
            return;
        }
        slot.accepted = Some(Accepted {
            digest,
            request: request.clone(),
        });

        if let Some(request) = request {
            let key = request.key();
            if !self.replies.contains_key(&key) {
                self.pending
                    .entry(key)
                    .or_insert(PendingRequest { request, since: now });
            }
        }

        self.broadcast(ProtocolMessage::Prepare(Vote { view, seq, digest }));
        self.check_prepared(seq, now);
    }

    fn on_prepare(&mut self, vote: Vote, message: SignedMessage, now: Instant) {
        let slot = self.slots.entry(vote.seq).or_insert_with(|| Slot::new(vote.view));
        slot.advance_to(vote.view);
        if slot.view != vote.view {
            return;
        }
        slot.prepares.entry(message.from).or_insert(message);
        self.check_prepared(vote.seq, now);
    }

    fn check_prepared(&mut self, seq: SeqNumber, now: Instant) {
        let quorum = self.membership.quorum();
        let Some(slot) = self.slots.get_mut(&seq) else {
            return;
        };
        if slot.prepared {
            return;
        }
        let Some(accepted) = slot.accepted.clone() else {
            return;
        };
        let matching = slot.matching_prepares();
        if matching.len() < quorum {
            return;
        }
        slot.prepared = true;
        let view = slot.view;

        let certificate = PreparedCertificate {
            view,
            seq,
            digest: accepted.digest,
            request: accepted.request,
            prepares: matching.into_iter().take(quorum).collect(),
        };
        let newer = self
            .prepared_certs
            .get(&seq)
            .map_or(true, |existing| existing.view < view);
        if newer {
            self.prepared_certs.insert(seq, certificate);
        }

        debug!(replica = self.id, view, seq, "Prepared");
        self.broadcast(ProtocolMessage::Commit(Vote {
            view,
            seq,
            digest: accepted.digest,
        }));
        self.check_committed(seq, now);
    }

    fn on_commit(&mut self, from: ReplicaId, vote: Vote, now: Instant) {
        let slot = self.slots.entry(vote.seq).or_insert_with(|| Slot::new(vote.view));
        slot.advance_to(vote.view);
        if slot.view != vote.view {
            return;
        }
        slot.commits.entry(from).or_insert(vote.digest);
        self.check_committed(vote.seq, now);
    }

    fn check_committed(&mut self, seq: SeqNumber, now: Instant) {
        let quorum = self.membership.quorum();
        let Some(slot) = self.slots.get_mut(&seq) else {
            return;
        };
        if !slot.prepared || slot.committed || slot.matching_commits() < quorum {
            return;
        }
        slot.committed = true;
        debug!(replica = self.id, view = slot.view, seq, "Committed");
        self.try_deliver(now);
    }

    /// Deliver committed slots in sequence order.
    fn try_deliver(&mut self, now: Instant) {
        let high = self.high_watermark();
        let mut progressed = false;
        loop {
            let next = self.last_delivered + 1;
            if !self.slots.get(&next).map_or(false, |s| s.committed) {
                break;
            }
            let Some(slot) = self.slots.remove(&next) else {
                break;
            };
            let Some(accepted) = slot.accepted else {
                break;
            };
            self.deliver(next, accepted);
            progressed = true;
        }

        if progressed {
            for pending in self.pending.values_mut() {
                pending.since = now;
            }
            if self.high_watermark() > high {
                self.release_held();
            }
            self.order_pending();
        }
    }

    fn deliver(&mut self, seq: SeqNumber, accepted: Accepted) {
        let Accepted { digest, request } = accepted;
        self.last_delivered = seq;
        self.log_digest = checkpoint::extend_log_digest(&self.log_digest, seq, &digest);
        self.expire_replies(seq);

        match request {
            Some(request) => self.apply(seq, digest, request),
            None => debug!(replica = self.id, seq, "Null request delivered"),
        }

        if seq % self.checkpoint_interval == 0 {
            debug!(
                replica = self.id,
                seq,
                digest = %short_hex(&self.log_digest),
                "Taking checkpoint"
            );
            self.broadcast(ProtocolMessage::Checkpoint {
                seq,
                digest: self.log_digest,
            });
        }
    }

    fn apply(&mut self, seq: SeqNumber, digest: Digest, request: Request) {
        let key = request.key();
        self.pending.remove(&key);
        self.assigned.remove(&key);
        if let Some(cached) = self.replies.get(&key) {
            debug!(replica = self.id, seq, key = %short_hex(&key), "Duplicate request skipped");
            let reply = Reply {
                seq: cached.seq,
                key,
                result: cached.result.clone(),
            };
            self.broadcast(ProtocolMessage::Reply(reply));
            return;
        }

        let delivery = Delivery {
            seq,
            digest,
            timestamp: request.timestamp,
            payload: request.payload,
        };
        let result = self.app.apply(&delivery);
        info!(
            replica = self.id,
            view = self.view,
            seq,
            digest = %short_hex(&digest),
            "Request delivered"
        );

        self.replies.insert(
            key,
            CachedReply {
                seq,
                result: result.clone(),
            },
        );
        self.reply_expiry.push_back((seq, key));
        self.broadcast(ProtocolMessage::Reply(Reply { seq, key, result }));
    }

    /// Drop cached replies delivered more than the retention span before
    /// `seq`. Depends only on the delivered log, so every correct replica
    /// makes the same duplicate decisions.
    fn expire_replies(&mut self, seq: SeqNumber) {
        let retention = self.log_window.saturating_mul(REPLY_RETENTION_WINDOWS);
        while let Some((delivered, key)) = self.reply_expiry.front().copied() {
            if delivered.saturating_add(retention) > seq {
                break;
            }
            self.reply_expiry.pop_front();
            self.replies.remove(&key);
        }
    }

    fn on_reply(&mut self, from: ReplicaId, reply: Reply) {
        let quorum = self.membership.quorum();
        let Some(votes) = self.awaiting.get_mut(&reply.key) else {
            return;
        };
        votes
            .entry(from)
            .or_insert_with(|| (reply.seq, reply.result.clone()));
        let agreeing = votes
            .values()
            .filter(|(seq, result)| *seq == reply.seq && *result == reply.result)
            .count();
        if agreeing < quorum {
            return;
        }

        self.awaiting.remove(&reply.key);
        debug!(replica = self.id, seq = reply.seq, "Decision reached");
        self.actions.push(Action::Decided(Decision {
            seq: reply.seq,
            key: reply.key,
            result: reply.result,
        }));
    }

    // =========================================================================
    // CHECKPOINTS
    // =========================================================================

    fn on_checkpoint(&mut self, message: SignedMessage, seq: SeqNumber, digest: Digest) {
        if seq <= self.stable.seq || seq % self.checkpoint_interval != 0 {
            return;
        }
        if !self.checkpoints.record(message) {
            return;
        }
        let quorum = self.membership.quorum();
        if let Some(certificate) = self.checkpoints.certificate(seq, digest, quorum) {
            self.make_stable(certificate);
            self.order_pending();
        }
    }

    /// Adopt `certificate` as the stable checkpoint and discard what it covers.
    fn make_stable(&mut self, certificate: CheckpointCertificate) {
        let seq = certificate.seq;
        if seq <= self.stable.seq {
            return;
        }
        info!(
            replica = self.id,
            seq,
            digest = %short_hex(&certificate.digest),
            "Checkpoint stable"
        );
        if self.last_delivered < seq {
            warn!(
                replica = self.id,
                seq,
                last_delivered = self.last_delivered,
                "Stable checkpoint is ahead of the local log"
            );
        }

        self.stable = certificate;
        self.checkpoints.prune(seq);
        self.prepared_certs = self.prepared_certs.split_off(&(seq + 1));
        self.release_held();
    }

    /// Re-examine messages held above the previous high watermark.
    fn release_held(&mut self) {
        let held = std::mem::take(&mut self.ahead);
        self.loopback.extend(held);
    }

    // =========================================================================
    // VIEW CHANGE
    // =========================================================================

    fn start_view_change(&mut self, target: ViewNumber, now: Instant) {
        let backoff = target.saturating_sub(self.view).clamp(1, 8) as u32;
        self.mode = Mode::ViewChanging {
            target,
            deadline: now + self.view_change_timeout * backoff,
        };
        info!(replica = self.id, view = self.view, target, "Starting view change");

        let high = self.stable.seq.saturating_add(self.log_window);
        let prepared = self
            .prepared_certs
            .range(self.stable.seq + 1..=high)
            .map(|(_, cert)| cert.clone())
            .collect();
        self.broadcast(ProtocolMessage::ViewChange {
            new_view: target,
            stable: self.stable.clone(),
            prepared,
        });
    }

    fn on_view_change(&mut self, message: SignedMessage, now: Instant) {
        let ProtocolMessage::ViewChange { new_view, .. } = &message.body else {
            return;
        };
        let new_view = *new_view;
        if new_view <= self.view {
            return;
        }
        if message.from != self.id
            && !view_change::is_valid_view_change(
                &message,
                new_view,
                &self.membership,
                self.log_window,
            )
        {
            warn!(
                replica = self.id,
                from = message.from,
                new_view,
                "Dropping invalid view change"
            );
            return;
        }

        // Keep only the sender's latest view change.
        let from = message.from;
        let superseded = self
            .view_changes
            .range(new_view + 1..)
            .any(|(_, votes)| votes.contains_key(&from));
        if superseded {
            return;
        }
        for votes in self.view_changes.values_mut() {
            votes.remove(&from);
        }
        self.view_changes.retain(|_, votes| !votes.is_empty());

        let votes = self.view_changes.entry(new_view).or_default();
        votes.insert(from, message);
        let count = votes.len();

        let joining = match self.mode {
            Mode::Normal => true,
            Mode::ViewChanging { target, .. } => target < new_view,
        };
        if joining && count >= self.membership.weak_quorum() {
            info!(replica = self.id, new_view, supporters = count, "Joining view change");
            self.start_view_change(new_view, now);
        }
        self.try_announce_new_view(new_view);
    }

    fn try_announce_new_view(&mut self, view: ViewNumber) {
        if self.membership.primary(view) != self.id || self.announced == Some(view) {
            return;
        }
        if !matches!(self.mode, Mode::ViewChanging { target, .. } if target == view) {
            return;
        }
        let quorum = self.membership.quorum();
        let Some(votes) = self.view_changes.get(&view) else {
            return;
        };
        if votes.len() < quorum {
            return;
        }

        let view_changes: Vec<SignedMessage> = votes.values().take(quorum).cloned().collect();
        self.announced = Some(view);
        info!(replica = self.id, view, "Announcing new view");
        self.broadcast(ProtocolMessage::NewView { view, view_changes });
    }

    fn on_new_view(&mut self, message: &SignedMessage, now: Instant) {
        let ProtocolMessage::NewView { view, view_changes } = &message.body else {
            return;
        };
        let view = *view;
        if view <= self.view {
            return;
        }
        if message.from != self.membership.primary(view) {
            warn!(replica = self.id, from = message.from, view, "New view from non-primary");
            return;
        }
        let window = self.log_window;
        if !view_change::is_valid_new_view(view, view_changes, &self.membership, window) {
            warn!(replica = self.id, from = message.from, view, "Dropping invalid new view");
            return;
        }

        let log = view_change::carried_log(view_changes);
        self.install_view(view, log, now);
    }

    fn install_view(&mut self, view: ViewNumber, log: CarriedLog, now: Instant) {
        let CarriedLog { stable, entries } = log;
        info!(
            replica = self.id,
            view,
            stable = stable.seq,
            carried = entries.len(),
            "Entering view"
        );
        self.view = view;
        self.mode = Mode::Normal;
        self.announced = None;
        self.view_changes = self.view_changes.split_off(&(view + 1));
        self.slots.clear();
        self.assigned.clear();

        let mut highest = self.last_delivered.max(stable.seq);
        self.make_stable(stable);

        for entry in entries {
            highest = highest.max(entry.seq);
            if entry.seq <= self.last_delivered {
                continue;
            }
            if let Some(request) = &entry.request {
                let key = request.key();
                self.assigned.insert(key, entry.seq);
                if !self.replies.contains_key(&key) {
                    self.pending.entry(key).or_insert_with(|| PendingRequest {
                        request: request.clone(),
                        since: now,
                    });
                }
            }

            let mut slot = Slot::new(view);
            slot.accepted = Some(Accepted {
                digest: entry.digest,
                request: entry.request,
            });
            self.slots.insert(entry.seq, slot);
            self.broadcast(ProtocolMessage::Prepare(Vote {
                view,
                seq: entry.seq,
                digest: entry.digest,
            }));
        }
        self.next_seq = highest;

        for pending in self.pending.values_mut() {
            pending.since = now;
        }

        // Make sure the new primary knows about our own outstanding requests.
        let primary = self.membership.primary(view);
        if primary != self.id {
            let resend: Vec<Request> = self
                .awaiting
                .keys()
                .filter_map(|key| self.pending.get(key))
                .map(|p| p.request.clone())
                .collect();
            for request in resend {
                self.send_to(primary, ProtocolMessage::Request(request));
            }
        }

        let held = std::mem::take(&mut self.future);
        self.loopback.extend(held);
        self.order_pending();
    }
}
