use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("invalid number: {0}")]
    Number(#[from] ParseIntError),
    #[error("duration too large: {0}")]
    Overflow(String),
}

/// Parse `150ms`, `2s`, `1m`; a bare number is milliseconds
pub fn parse_duration(s: &str) -> std::result::Result<Duration, DurationParseError> {
    let s = s.trim().to_lowercase();

    Ok(if let Some(num) = s.strip_suffix("ms") {
        Duration::from_millis(u64::from_str(num)?)
    } else if let Some(num) = s.strip_suffix('s') {
        Duration::from_secs(u64::from_str(num)?)
    } else if let Some(num) = s.strip_suffix('m') {
        let secs = u64::from_str(num)?
            .checked_mul(60)
            .ok_or_else(|| DurationParseError::Overflow(s.clone()))?;
        Duration::from_secs(secs)
    } else {
        Duration::from_millis(u64::from_str(&s)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_test() {
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("150"), Ok(Duration::from_millis(150)));
        assert_eq!(parse_duration("150ms"), Ok(Duration::from_millis(150)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("2S"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("3m"), Ok(Duration::from_secs(180)));
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("1h").is_err());
        assert!(parse_duration("-1s").is_err());
        assert_eq!(
            parse_duration("999999999999999999m"),
            Err(DurationParseError::Overflow("999999999999999999m".into()))
        );
        assert_eq!(
            parse_duration("5124095576030431m"),
            Ok(Duration::from_secs(5124095576030431 * 60))
        );
    }
}
