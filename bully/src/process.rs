mod control_loop;
mod election;

pub use self::election::{ElectionState, Variant, VariantParseError};

use crate::directory::{Directory, DirectoryError};
use crate::process::control_loop::ControlLoop;
use crate::task::AutoJoinHandle;
use bully_api::{Message, MessageKind, ProcessId};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use std::{io, ops};
use thiserror::Error;
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;

/// Runtime parameters of a process
#[derive(TypedBuilder, Debug, Clone)]
pub struct Parameters {
    /// How long to wait in `AwaitingVotes` before concluding that no
    /// higher peer is going to answer
    #[builder(default = Parameters::DEFAULT_ELECTION_TIMEOUT)]
    pub election_timeout: Duration,

    /// Bounded wait on the inbox; idle logic runs when it elapses
    #[builder(default = Parameters::DEFAULT_TICK_INTERVAL)]
    pub tick_interval: Duration,

    #[builder(default)]
    pub variant: Variant,
}

impl Parameters {
    pub const DEFAULT_ELECTION_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("process {0} was not wired to a directory")]
    NotWired(ProcessId),
    #[error("process {0} is already wired")]
    AlreadyWired(ProcessId),
    #[error("process {0} is not in the directory")]
    NotInDirectory(ProcessId),
    #[error("control loop of process {0} was already started")]
    AlreadyStarted(ProcessId),
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("could not spawn control loop: {0}")]
    Spawn(#[from] io::Error),
}

pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Items a control loop receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A protocol message from a peer
    Message(Message),
    /// External trigger: start an election now
    StartElection,
}

/// Snapshot of the per-kind sent-message counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageStats {
    by_kind: [u64; MessageKind::COUNT],
}

impl MessageStats {
    pub fn get(&self, kind: MessageKind) -> u64 {
        self.by_kind[kind.index()]
    }

    pub fn total(&self) -> u64 {
        self.by_kind.iter().sum()
    }
}

impl ops::Add for MessageStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        for (a, b) in self.by_kind.iter_mut().zip(rhs.by_kind) {
            *a += b;
        }
        self
    }
}

impl std::iter::Sum for MessageStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, s| acc + s)
    }
}

/// Marker stored in `current_coordinator` when nobody is known
const UNKNOWN_COORDINATOR: u64 = u64::MAX;

/// Part of the process visible to peers and observers
///
/// Every field is either immutable or atomic. Only the owning control
/// loop writes the election fields; `kill` is the one exception and it
/// can only ever move the state to `Dead`.
#[derive(Debug)]
pub struct ProcessShared {
    id: ProcessId,
    params: Parameters,
    inbox_tx: flume::Sender<Inbound>,

    state: AtomicU8,
    current_coordinator: AtomicU64,

    /// Total messages this process originated, never reset
    messages_sent: AtomicU64,
    messages_sent_by_kind: [AtomicU64; MessageKind::COUNT],

    /// Control loop exits on the next iteration once set
    is_stopped: AtomicBool,
}

impl ProcessShared {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn state(&self) -> ElectionState {
        ElectionState::try_from(self.state.load(Ordering::SeqCst)).unwrap_or(ElectionState::Dead)
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ElectionState::Dead
    }

    pub fn is_stopped(&self) -> bool {
        self.is_stopped.load(Ordering::SeqCst)
    }

    pub fn current_coordinator(&self) -> Option<ProcessId> {
        match self.current_coordinator.load(Ordering::SeqCst) {
            UNKNOWN_COORDINATOR => None,
            id => u32::try_from(id).ok().map(ProcessId),
        }
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MessageStats {
        let mut stats = MessageStats::default();
        for kind in MessageKind::ALL {
            stats.by_kind[kind.index()] =
                self.messages_sent_by_kind[kind.index()].load(Ordering::SeqCst);
        }
        stats
    }

    /// Move to `next`, unless already dead
    ///
    /// Returns the previous state, or `None` if the transition was refused.
    pub(crate) fn transition(&self, next: ElectionState) -> Option<ElectionState> {
        let dead = u8::from(ElectionState::Dead);
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != dead).then_some(u8::from(next))
            })
            .ok()
            .map(|prev| ElectionState::try_from(prev).unwrap_or(ElectionState::Dead))
    }

    pub(crate) fn set_current_coordinator(&self, id: Option<ProcessId>) {
        self.current_coordinator.store(
            id.map_or(UNKNOWN_COORDINATOR, |id| u64::from(id.as_u32())),
            Ordering::SeqCst,
        );
    }

    pub(crate) fn mark_dead(&self) {
        self.state
            .store(u8::from(ElectionState::Dead), Ordering::SeqCst);
        self.is_stopped.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stop(&self) {
        self.is_stopped.store(true, Ordering::SeqCst);
    }

    /// Put an item into this process' inbox
    ///
    /// Never blocks. If the control loop is already gone the item is
    /// silently dropped, which is what "sending to a dead process" means.
    pub(crate) fn enqueue(&self, inbound: Inbound) {
        let _ = self.inbox_tx.send(inbound);
    }

    /// Send `kind` from `self` to `to`, counting it on the sender's side
    pub(crate) fn send(&self, to: &ProcessShared, kind: MessageKind) {
        if self.is_dead() {
            return;
        }
        trace!(from = %self.id, to = %to.id, %kind, "Enqueue");
        to.enqueue(Inbound::Message(Message::new(kind, self.id)));
        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        self.messages_sent_by_kind[kind.index()].fetch_add(1, Ordering::SeqCst);
    }
}

/// Cheap, clonable reference to a peer
///
/// This is what the [`Directory`] stores: it allows enqueuing into the
/// peer's inbox and reading its observables, nothing else.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    shared: Arc<ProcessShared>,
}

impl ops::Deref for PeerHandle {
    type Target = ProcessShared;

    fn deref(&self) -> &Self::Target {
        &self.shared
    }
}

/// A single process taking part in elections
///
/// Owns the control loop thread. Dropping the process stops the loop
/// and waits for it to finish.
pub struct Process {
    shared: Arc<ProcessShared>,
    /// Taken by the control loop when it starts
    inbox_rx: Mutex<Option<flume::Receiver<Inbound>>>,
    directory: OnceLock<Arc<Directory>>,
    join_handle: Mutex<Option<AutoJoinHandle>>,
}

impl ops::Deref for Process {
    type Target = ProcessShared;

    fn deref(&self) -> &Self::Target {
        &self.shared
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Process {
    pub fn new(id: ProcessId, params: Parameters) -> Self {
        let (inbox_tx, inbox_rx) = flume::unbounded();

        Self {
            shared: Arc::new(ProcessShared {
                id,
                params,
                inbox_tx,
                state: AtomicU8::new(u8::from(ElectionState::Idle)),
                current_coordinator: AtomicU64::new(UNKNOWN_COORDINATOR),
                messages_sent: AtomicU64::new(0),
                messages_sent_by_kind: Default::default(),
                is_stopped: AtomicBool::new(false),
            }),
            inbox_rx: Mutex::new(Some(inbox_rx)),
            directory: OnceLock::new(),
            join_handle: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> PeerHandle {
        PeerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Attach the shared peer directory
    ///
    /// Must happen exactly once, before [`Self::start_loop`].
    pub fn wire(&self, directory: &Arc<Directory>) -> ProcessResult<()> {
        if !directory.contains(self.id()) {
            return Err(ProcessError::NotInDirectory(self.id()));
        }
        self.directory
            .set(Arc::clone(directory))
            .map_err(|_| ProcessError::AlreadyWired(self.id()))
    }

    /// Spawn the control loop thread
    pub fn start_loop(&self) -> ProcessResult<()> {
        let control_loop = self.control_loop()?;
        let join_handle =
            AutoJoinHandle::spawn(format!("process-{}", self.id()), move || control_loop.run())?;

        *self.join_handle.lock().expect("Locking failed") = Some(join_handle);
        debug!(id = %self.id(), "Control loop started");
        Ok(())
    }

    /// Build the control loop, taking ownership of the inbox receiver
    pub(crate) fn control_loop(&self) -> ProcessResult<ControlLoop> {
        let directory = self
            .directory
            .get()
            .cloned()
            .ok_or(ProcessError::NotWired(self.id()))?;

        let inbox_rx = self
            .inbox_rx
            .lock()
            .expect("Locking failed")
            .take()
            .ok_or(ProcessError::AlreadyStarted(self.id()))?;

        Ok(ControlLoop::new(
            Arc::clone(&self.shared),
            directory,
            inbox_rx,
        ))
    }

    /// Kill the process
    ///
    /// Terminal: the process never sends or transitions again. Waits for
    /// the control loop to exit, which takes at most one tick.
    pub fn kill(&self) {
        self.shared.mark_dead();
        info!(id = %self.id(), "Process killed");
        // join outside of the lock
        let join_handle = self.join_handle.lock().expect("Locking failed").take();
        drop(join_handle);
    }

    /// Ask the process to start an election
    ///
    /// Handled by the control loop on its next iteration.
    pub fn start_election(&self) {
        self.shared.enqueue(Inbound::StartElection);
    }

    #[cfg(test)]
    pub(crate) fn drain_inbox(&self) -> Vec<Inbound> {
        self.inbox_rx
            .lock()
            .expect("Locking failed")
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }
}
