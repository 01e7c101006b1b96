use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::{Duration, Instant};

use bully_api::ProcessId;
use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Election state of a single process
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Clone, Copy, Display)]
#[repr(u8)]
pub enum ElectionState {
    /// Not electing, not coordinator
    Idle = 0,
    /// Sent `Election` upward, collecting `Ok`s
    AwaitingVotes = 1,
    /// Handed the round to a higher peer, waiting for its announcement
    AwaitingCoordinator = 2,
    /// Won the election
    Coordinator = 3,
    /// Killed, terminal
    Dead = 4,
}

/// Protocol variant
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Display)]
pub enum Variant {
    /// Steps out of the round on the first `Ok` and trusts that someone
    /// will eventually announce
    #[display(fmt = "original")]
    Original,
    /// Tracks the highest responder and hands it the round explicitly
    #[default]
    #[display(fmt = "improved")]
    Improved,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown variant: {0} (expected `original` or `improved`)")]
pub struct VariantParseError(String);

impl FromStr for Variant {
    type Err = VariantParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" => Ok(Variant::Original),
            "improved" => Ok(Variant::Improved),
            _ => Err(VariantParseError(s.to_owned())),
        }
    }
}

/// Book-keeping of the round this process started most recently
#[derive(Debug, Default)]
pub(crate) struct ElectionRound {
    /// Peers that answered `Ok`
    pub votes: BTreeSet<ProcessId>,
    /// Highest id that answered `Ok` (or was otherwise picked) so far
    pub current_coordinator: Option<ProcessId>,
    /// Number of peers with a higher id at the time the round started
    pub expected_votes: usize,
    pub started_at: Option<Instant>,
}

impl ElectionRound {
    pub fn reset(&mut self, now: Instant, expected_votes: usize) {
        self.votes.clear();
        self.current_coordinator = None;
        self.expected_votes = expected_votes;
        self.started_at = Some(now);
    }

    /// Record an `Ok` from `voter`
    ///
    /// Returns `true` if `voter` became the new front-runner.
    pub fn record_vote(&mut self, voter: ProcessId) -> bool {
        self.votes.insert(voter);
        if self.current_coordinator.map_or(true, |current| current < voter) {
            self.current_coordinator = Some(voter);
            true
        } else {
            false
        }
    }

    pub fn all_votes_received(&self) -> bool {
        self.expected_votes <= self.votes.len()
    }

    pub fn timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.started_at
            .map_or(false, |started_at| timeout < now.saturating_duration_since(started_at))
    }

    /// Whether the round should be concluded now
    pub fn is_decided(&self, now: Instant, timeout: Duration) -> bool {
        self.all_votes_received() || self.timed_out(now, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_vote_tracks_maximum() {
        let mut round = ElectionRound::default();
        round.reset(Instant::now(), 3);

        assert!(round.record_vote(ProcessId(2)));
        assert!(round.record_vote(ProcessId(4)));
        assert!(!round.record_vote(ProcessId(3)));
        assert!(!round.record_vote(ProcessId(4)));

        assert_eq!(round.current_coordinator, Some(ProcessId(4)));
        assert_eq!(round.votes.len(), 3);
        assert!(round.all_votes_received());
    }

    #[test]
    fn reset_clears_round() {
        let mut round = ElectionRound::default();
        let start = Instant::now();
        round.reset(start, 2);
        round.record_vote(ProcessId(9));

        round.reset(start, 2);
        assert!(round.votes.is_empty());
        assert_eq!(round.current_coordinator, None);
        assert!(!round.all_votes_received());
    }

    #[test]
    fn decided_after_timeout() {
        let mut round = ElectionRound::default();
        let start = Instant::now();
        let timeout = Duration::from_secs(2);
        round.reset(start, 1);

        assert!(!round.is_decided(start + Duration::from_secs(1), timeout));
        assert!(!round.is_decided(start + timeout, timeout));
        assert!(round.is_decided(start + Duration::from_secs(3), timeout));
    }

    #[test]
    fn no_higher_peers_is_decided_immediately() {
        let mut round = ElectionRound::default();
        let start = Instant::now();
        round.reset(start, 0);

        assert!(round.is_decided(start, Duration::from_secs(2)));
    }

    #[test]
    fn variant_parse() {
        assert_eq!("original".parse(), Ok(Variant::Original));
        assert_eq!(" Improved ".parse(), Ok(Variant::Improved));
        assert!("bully".parse::<Variant>().is_err());
        assert_eq!(Variant::default().to_string(), "improved");
    }
}
