mod opts;

use std::time::Duration;

use bully::{Cluster, ClusterError, MessageStats, Parameters, ProcessId, Variant};
use thiserror::Error;
use tracing::debug;

pub use opts::Opts;

/// Peer-set sizes swept by default
pub const DEFAULT_SIZES: [usize; 10] = [2, 5, 10, 15, 17, 20, 22, 25, 30, 32];

#[derive(Error, Debug)]
pub enum MeasureError {
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
    #[error("{variant} election with {size} processes did not converge within {wait:?}")]
    NotConverged {
        variant: Variant,
        size: usize,
        wait: Duration,
    },
}

pub type MeasureResult<T> = std::result::Result<T, MeasureError>;

/// Outcome of one clean election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub winner: ProcessId,
    pub messages_sent: u64,
    pub stats: MessageStats,
}

/// Run one election with every process alive, started by process 0
pub fn measure_election(
    size: usize,
    params: Parameters,
    wait: Duration,
) -> MeasureResult<Measurement> {
    let cluster = Cluster::new(size, params)?;
    let variant = cluster.params().variant;

    cluster.start_election(ProcessId(0))?;
    let winner = cluster
        .wait_for_convergence(wait)
        .ok_or(MeasureError::NotConverged {
            variant,
            size,
            wait,
        })?;

    let messages_sent = cluster.total_messages_sent();
    debug!(size, %variant, %winner, messages_sent, "Measured");

    Ok(Measurement {
        winner,
        messages_sent,
        stats: cluster.stats(),
    })
}
