#![allow(unused)]

use bully::{Cluster, ElectionState, Parameters, ProcessId, Variant};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const TICK: Duration = Duration::from_millis(10);
pub const ELECTION_TIMEOUT: Duration = Duration::from_millis(100);
pub const CONVERGENCE_WAIT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn test_params(variant: Variant) -> Parameters {
    Parameters::builder()
        .election_timeout(ELECTION_TIMEOUT)
        .tick_interval(TICK)
        .variant(variant)
        .build()
}

pub struct TestCluster {
    cluster: Cluster,
}

impl TestCluster {
    pub fn new(size: usize) -> anyhow::Result<Self> {
        Self::with_params(size, test_params(Variant::Improved))
    }

    pub fn with_params(size: usize, params: Parameters) -> anyhow::Result<Self> {
        init_logging();
        Ok(Self {
            cluster: Cluster::new(size, params)?,
        })
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn state(&self, id: u32) -> ElectionState {
        self.cluster
            .process(ProcessId(id))
            .expect("unknown process")
            .state()
    }

    pub fn coordinator_of(&self, id: u32) -> Option<ProcessId> {
        self.cluster
            .process(ProcessId(id))
            .expect("unknown process")
            .current_coordinator()
    }

    pub fn messages_sent(&self, id: u32) -> u64 {
        self.cluster
            .process(ProcessId(id))
            .expect("unknown process")
            .messages_sent()
    }

    pub fn elect(&self, initiator: u32) -> anyhow::Result<ProcessId> {
        self.cluster.start_election(ProcessId(initiator))?;
        self.cluster
            .wait_for_convergence(CONVERGENCE_WAIT)
            .ok_or_else(|| anyhow::anyhow!("election did not converge"))
    }

    pub fn kill(&self, id: u32) -> anyhow::Result<()> {
        Ok(self.cluster.kill(ProcessId(id))?)
    }
}
