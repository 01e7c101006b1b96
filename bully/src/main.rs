#![deny(clippy::as_conversions)]
use anyhow::bail;
use bully::{Cluster, Parameters, ProcessId};
use opts::Opts;
use std::io;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod opts;

fn main() -> anyhow::Result<()> {
    init_logging();

    let opts = Opts::from_args();

    let params = Parameters::builder()
        .election_timeout(opts.election_timeout)
        .tick_interval(opts.tick_interval)
        .variant(opts.variant)
        .build();

    let cluster = Cluster::new(opts.processes, params)?;

    for id in &opts.kill {
        cluster.kill(ProcessId(*id))?;
    }

    info!(initiator = opts.initiator, "Starting election");
    cluster.start_election(ProcessId(opts.initiator))?;

    let winner = cluster.wait_for_convergence(opts.wait);

    for process in cluster.processes() {
        println!(
            "{:>4} {:<20} coordinator={:<8} sent={}",
            process.id(),
            process.state().to_string(),
            process
                .current_coordinator()
                .map_or_else(|| "?".to_owned(), |id| id.to_string()),
            process.messages_sent()
        );
    }
    println!("Total messages sent: {}", cluster.total_messages_sent());

    match winner {
        Some(winner) => {
            println!("Coordinator: {winner}");
            Ok(())
        }
        None => bail!("election did not converge within {:?}", opts.wait),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_writer(io::stderr),
        )
        .init();
}
