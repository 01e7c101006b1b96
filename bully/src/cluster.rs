use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bully_api::ProcessId;
use convi::ExpectFrom;
use thiserror::Error;
use tracing::{debug, info};

use crate::directory::Directory;
use crate::process::{ElectionState, MessageStats, Parameters, Process, ProcessError};

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("unknown process: {0}")]
    UnknownProcess(ProcessId),
    #[error("process {0} is dead")]
    ProcessDead(ProcessId),
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// A fixed set of processes with ids `0..size`, wired and running
///
/// Bootstrap and failure injection for simulations and tests.
pub struct Cluster {
    params: Parameters,
    processes: Vec<Process>,
}

impl Cluster {
    const POLL_INTERVAL: Duration = Duration::from_millis(5);

    pub fn new(size: usize, params: Parameters) -> ClusterResult<Self> {
        info!(size, variant = %params.variant, "Starting cluster");

        let processes: Vec<_> = (0..size)
            .map(|i| Process::new(ProcessId(u32::expect_from(i)), params.clone()))
            .collect();

        let directory = Arc::new(
            Directory::new(processes.iter().map(Process::handle)).map_err(ProcessError::from)?,
        );

        for process in &processes {
            process.wire(&directory)?;
        }
        for process in &processes {
            process.start_loop()?;
        }

        Ok(Self { params, processes })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn process(&self, id: ProcessId) -> ClusterResult<&Process> {
        self.processes
            .iter()
            .find(|p| p.id() == id)
            .ok_or(ClusterError::UnknownProcess(id))
    }

    pub fn kill(&self, id: ProcessId) -> ClusterResult<()> {
        self.process(id)?.kill();
        Ok(())
    }

    /// Ask `id` to start an election; a dead process can't
    pub fn start_election(&self, id: ProcessId) -> ClusterResult<()> {
        let process = self.process(id)?;
        if process.is_dead() {
            return Err(ClusterError::ProcessDead(id));
        }
        process.start_election();
        Ok(())
    }

    pub fn live_ids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes
            .iter()
            .filter(|p| !p.is_dead())
            .map(|p| p.id())
    }

    pub fn highest_live_id(&self) -> Option<ProcessId> {
        self.live_ids().max()
    }

    /// Live processes currently in `Coordinator` state
    pub fn coordinators(&self) -> Vec<ProcessId> {
        self.processes
            .iter()
            .filter(|p| p.state() == ElectionState::Coordinator)
            .map(|p| p.id())
            .collect()
    }

    pub fn total_messages_sent(&self) -> u64 {
        self.processes.iter().map(|p| p.messages_sent()).sum()
    }

    pub fn stats(&self) -> MessageStats {
        self.processes.iter().map(|p| p.stats()).sum()
    }

    /// The winner, if the live processes currently agree on one
    ///
    /// Exactly one live coordinator, every other live process idle and
    /// pointing at it.
    pub fn agreed_coordinator(&self) -> Option<ProcessId> {
        let coordinators = self.coordinators();
        let &[coordinator] = coordinators.as_slice() else { return None; };

        self.processes
            .iter()
            .filter(|p| !p.is_dead() && p.id() != coordinator)
            .all(|p| {
                p.state() == ElectionState::Idle && p.current_coordinator() == Some(coordinator)
            })
            .then_some(coordinator)
    }

    /// Wait until the processes agree on a coordinator and stop talking
    ///
    /// The agreement and the total message count have to stay unchanged
    /// for three tick intervals, so a late cascade can't slip past.
    pub fn wait_for_convergence(&self, timeout: Duration) -> Option<ProcessId> {
        let deadline = Instant::now() + timeout;
        let settle = self.params.tick_interval * 3;

        let mut stable_since: Option<(Instant, ProcessId, u64)> = None;

        while Instant::now() < deadline {
            let now = Instant::now();
            let observed = self
                .agreed_coordinator()
                .map(|winner| (winner, self.total_messages_sent()));

            stable_since = match (stable_since, observed) {
                (Some((since, prev_winner, prev_sent)), Some((winner, sent)))
                    if prev_winner == winner && prev_sent == sent =>
                {
                    if settle <= now.saturating_duration_since(since) {
                        debug!(%winner, messages = sent, "Converged");
                        return Some(winner);
                    }
                    Some((since, winner, sent))
                }
                (_, Some((winner, sent))) => Some((now, winner, sent)),
                (_, None) => None,
            };

            thread::sleep(Self::POLL_INTERVAL);
        }

        None
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        // stop every loop before any of them is joined
        for process in &self.processes {
            process.stop();
        }
    }
}
