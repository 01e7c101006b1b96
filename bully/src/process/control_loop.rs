use std::sync::Arc;
use std::time::Instant;

use bully_api::{Message, MessageKind, ProcessId};
use flume::RecvTimeoutError;
use tracing::{debug, info};

use super::election::{ElectionRound, ElectionState, Variant};
use super::{Inbound, ProcessShared};
use crate::directory::Directory;
use crate::task::PanicGuard;

/// The per-process election state machine and its loop
///
/// Owns everything that only the process itself may mutate. Peers
/// interact with it exclusively through the inbox.
pub(crate) struct ControlLoop {
    shared: Arc<ProcessShared>,
    directory: Arc<Directory>,
    inbox_rx: flume::Receiver<Inbound>,

    round: ElectionRound,
    /// Set while our own election is outstanding (or won); keeps
    /// cascading `Election`s from re-triggering it
    election_announced: bool,
    /// `Coordinator` broadcast done for the current win
    coordinator_announced: bool,
    /// Election to start at the top of the next iteration
    election_pending: bool,
}

impl ControlLoop {
    pub fn new(
        shared: Arc<ProcessShared>,
        directory: Arc<Directory>,
        inbox_rx: flume::Receiver<Inbound>,
    ) -> Self {
        Self {
            shared,
            directory,
            inbox_rx,
            round: ElectionRound::default(),
            election_announced: false,
            coordinator_announced: false,
            election_pending: false,
        }
    }

    fn id(&self) -> ProcessId {
        self.shared.id()
    }

    fn variant(&self) -> Variant {
        self.shared.params().variant
    }

    pub fn run(mut self) {
        let id = self.id();
        let _guard = scopeguard::guard((), |_| {
            info!(%id, "Control loop is done");
        });
        let panic_guard = PanicGuard::new("control-loop", Arc::clone(&self.shared));
        let tick = self.shared.params().tick_interval;

        while !self.shared.is_stopped() {
            self.run_pending_election(Instant::now());

            let res = self.inbox_rx.recv_timeout(tick);

            // no sends and no transitions once killed, even for what was already received
            if self.shared.is_stopped() {
                break;
            }

            match res {
                Ok(inbound) => self.handle_inbound(inbound, Instant::now()),
                Err(RecvTimeoutError::Timeout) => self.on_idle_tick(Instant::now()),
                // we hold a sender ourselves, but just in case
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        panic_guard.done();
    }

    pub fn handle_inbound(&mut self, inbound: Inbound, now: Instant) {
        match inbound {
            Inbound::StartElection => {
                debug!(id = %self.id(), "Election triggered externally");
                self.start_election(now);
            }
            Inbound::Message(msg) => self.handle_message(msg),
        }
    }

    fn handle_message(&mut self, msg: Message) {
        let state = self.shared.state();
        if state == ElectionState::Dead {
            return;
        }
        debug!(id = %self.id(), %state, kind = %msg.kind, from = %msg.sender, "Received");

        match (self.variant(), msg.kind) {
            (_, MessageKind::Election) => self.on_election(msg.sender),
            (Variant::Improved, MessageKind::Ok) => self.on_ok_improved(msg.sender),
            (Variant::Original, MessageKind::Ok) => self.on_ok_original(msg.sender, state),
            (_, MessageKind::Coordinator) => self.on_coordinator(msg.sender),
            (Variant::Improved, MessageKind::YouAreCoordinator) => {
                self.on_you_are_coordinator(msg.sender, state)
            }
            (Variant::Original, MessageKind::YouAreCoordinator) => {
                debug!(id = %self.id(), from = %msg.sender, "Ignoring YouAreCoordinator");
            }
        }
    }

    /// Always answer, so the challenger knows a higher process is alive.
    /// Our own upward election is deferred to the next iteration.
    fn on_election(&mut self, from: ProcessId) {
        self.send_to(from, MessageKind::Ok);

        match self.variant() {
            Variant::Original => self.election_pending = true,
            Variant::Improved => {
                if !self.election_announced {
                    self.election_pending = true;
                }
            }
        }
    }

    fn on_ok_improved(&mut self, from: ProcessId) {
        if self.round.record_vote(from) {
            self.shared
                .set_current_coordinator(self.round.current_coordinator);
        }
    }

    fn on_ok_original(&mut self, from: ProcessId, state: ElectionState) {
        if state != ElectionState::AwaitingVotes {
            return;
        }
        self.round.record_vote(from);
        self.transition(ElectionState::Idle);
    }

    fn on_coordinator(&mut self, from: ProcessId) {
        self.round.current_coordinator = Some(from);
        self.shared.set_current_coordinator(Some(from));
        self.election_announced = false;
        self.election_pending = false;
        self.coordinator_announced = false;
        self.transition(ElectionState::Idle);
    }

    fn on_you_are_coordinator(&mut self, from: ProcessId, state: ElectionState) {
        match state {
            ElectionState::AwaitingCoordinator => {
                self.round.current_coordinator = Some(self.id());
                self.shared.set_current_coordinator(Some(self.id()));
                self.election_pending = true;
            }
            ElectionState::Coordinator => {
                // already won, the requester missed (or is about to miss) our broadcast
                self.send_to(from, MessageKind::Coordinator);
            }
            _ => {
                debug!(id = %self.id(), %state, from = %from, "Ignoring YouAreCoordinator");
            }
        }
    }

    /// Start an election cascaded from a received message, if one is pending
    pub fn run_pending_election(&mut self, now: Instant) {
        if self.election_pending {
            self.election_pending = false;
            self.start_election(now);
        }
    }

    /// Challenge every higher peer, or win right away if there is none
    pub fn start_election(&mut self, now: Instant) {
        if self.shared.is_dead() {
            return;
        }

        let id = self.id();
        let expected_votes = self.directory.higher_than(id).count();

        self.round.reset(now, expected_votes);
        self.shared.set_current_coordinator(None);
        self.election_announced = true;
        self.coordinator_announced = false;

        if expected_votes == 0 {
            debug!(%id, "No higher peers, taking over");
            self.become_coordinator();
            return;
        }

        for peer in self.directory.higher_than(id) {
            self.shared.send(peer, MessageKind::Election);
        }
        self.transition(ElectionState::AwaitingVotes);
        debug!(%id, expected_votes, "Election started");
    }

    /// Bounded inbox wait elapsed with nothing to handle
    pub fn on_idle_tick(&mut self, now: Instant) {
        match self.shared.state() {
            ElectionState::AwaitingVotes => self.evaluate_round(now),
            ElectionState::Coordinator => self.announce_coordinator(),
            ElectionState::Idle | ElectionState::AwaitingCoordinator | ElectionState::Dead => {}
        }
    }

    fn evaluate_round(&mut self, now: Instant) {
        let timeout = self.shared.params().election_timeout;
        if !self.round.is_decided(now, timeout) {
            return;
        }

        match (self.variant(), self.round.current_coordinator) {
            (_, None) => {
                info!(id = %self.id(), "No higher peer answered");
                self.become_coordinator();
            }
            (_, Some(front_runner)) if front_runner == self.id() => self.become_coordinator(),
            // original variant leaves the round on the first `Ok`; nothing left to decide
            (Variant::Original, Some(_)) => {
                self.transition(ElectionState::Idle);
            }
            (Variant::Improved, Some(front_runner)) => {
                debug!(id = %self.id(), %front_runner, "Handing over the round");
                self.send_to(front_runner, MessageKind::YouAreCoordinator);
                self.transition(ElectionState::AwaitingCoordinator);
            }
        }
    }

    fn become_coordinator(&mut self) {
        let id = self.id();
        self.round.current_coordinator = Some(id);
        self.shared.set_current_coordinator(Some(id));
        self.coordinator_announced = false;
        if self.transition(ElectionState::Coordinator).is_some() {
            self.announce_coordinator();
        }
    }

    /// Broadcast `Coordinator` to every other live peer, once per win
    fn announce_coordinator(&mut self) {
        if self.coordinator_announced {
            return;
        }
        let id = self.id();
        for peer in self.directory.others(id).filter(|peer| !peer.is_dead()) {
            self.shared.send(peer, MessageKind::Coordinator);
        }
        self.coordinator_announced = true;
        info!(%id, "Announced as coordinator");
    }

    fn send_to(&self, to: ProcessId, kind: MessageKind) {
        if let Some(peer) = self.directory.get(to) {
            self.shared.send(peer, kind);
        }
    }

    fn transition(&self, next: ElectionState) -> Option<ElectionState> {
        let prev = self.shared.transition(next);
        if let Some(prev) = prev.filter(|prev| *prev != next) {
            debug!(id = %self.id(), from = %prev, to = %next, "Transition");
        }
        prev
    }
}
