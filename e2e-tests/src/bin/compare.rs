use bully::Variant;
use bully_e2e::{measure_election, DEFAULT_SIZES};
use clap::Parser;
use derive_more::Display;
use error_stack::{Context, IntoReport, ResultExt};
use std::io;
use tracing::info;
use tracing_subscriber::{prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Display)]
#[display(fmt = "application error")]
pub struct AppError;

impl Context for AppError {}

pub type AppResult<T> = error_stack::Result<T, AppError>;

#[derive(Parser, Debug, Clone)]
pub struct Opts {
    #[clap(flatten)]
    pub common: bully_e2e::Opts,

    /// Comma separated peer-set sizes
    #[clap(long, value_delimiter = ',')]
    pub sizes: Vec<usize>,
}

impl Opts {
    pub fn from_args() -> Self {
        Opts::parse()
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_writer(io::stderr),
        )
        .init();

    let opts = Opts::from_args();
    let sizes = if opts.sizes.is_empty() {
        DEFAULT_SIZES.to_vec()
    } else {
        opts.sizes.clone()
    };

    println!("processes,original,improved");
    for size in sizes {
        let original = measure_election(
            size,
            opts.common.params(Variant::Original),
            opts.common.wait,
        )
        .report()
        .change_context(AppError)?;
        let improved = measure_election(
            size,
            opts.common.params(Variant::Improved),
            opts.common.wait,
        )
        .report()
        .change_context(AppError)?;

        info!(size, winner = %improved.winner, "Done");
        println!(
            "{size},{},{}",
            original.messages_sent, improved.messages_sent
        );
    }

    Ok(())
}
