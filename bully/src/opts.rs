use bully::{parse_duration, Variant};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
pub struct Opts {
    /// Number of processes, with ids `0..processes`
    #[clap(long = "processes", short = 'n', default_value = "5")]
    pub processes: usize,

    /// Process that starts the election
    #[clap(long = "initiator", default_value = "0")]
    pub initiator: u32,

    /// Processes to kill before the election starts
    #[clap(long = "kill")]
    pub kill: Vec<u32>,

    #[clap(long = "variant", env = "BULLY_VARIANT", default_value = "improved")]
    pub variant: Variant,

    #[clap(long = "election-timeout", value_parser = parse_duration, default_value = "2s")]
    pub election_timeout: Duration,

    #[clap(long = "tick", value_parser = parse_duration, default_value = "1s")]
    pub tick_interval: Duration,

    /// How long to wait for the election to converge
    #[clap(long = "wait", value_parser = parse_duration, default_value = "30s")]
    pub wait: Duration,
}

impl Opts {
    pub fn from_args() -> Self {
        Opts::parse()
    }
}

#[test]
fn opts_parse_test() {
    let opts = Opts::try_parse_from([
        "bully", "-n", "7", "--kill", "6", "--kill", "5", "--variant", "original", "--tick",
        "100ms",
    ])
    .unwrap();

    assert_eq!(opts.processes, 7);
    assert_eq!(opts.kill, [6, 5]);
    assert_eq!(opts.variant, Variant::Original);
    assert_eq!(opts.tick_interval, Duration::from_millis(100));
    assert_eq!(opts.election_timeout, Duration::from_secs(2));
}
