use std::time::Duration;

use bully::{parse_duration, Parameters, Variant};
use clap::Parser;

/// Timing options shared by the measurement binaries
#[derive(Parser, Debug, Clone)]
pub struct Opts {
    #[clap(long = "election-timeout", value_parser = parse_duration, default_value = "100ms")]
    pub election_timeout: Duration,

    #[clap(long = "tick", value_parser = parse_duration, default_value = "10ms")]
    pub tick_interval: Duration,

    /// Give up on an election that did not converge after this long
    #[clap(long = "wait", value_parser = parse_duration, default_value = "30s")]
    pub wait: Duration,
}

impl Opts {
    pub fn from_args() -> Self {
        Opts::parse()
    }

    pub fn params(&self, variant: Variant) -> Parameters {
        Parameters::builder()
            .election_timeout(self.election_timeout)
            .tick_interval(self.tick_interval)
            .variant(variant)
            .build()
    }
}
