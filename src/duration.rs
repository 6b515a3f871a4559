//! Duration parsing utilities for human-readable durations like "10s", "500ms".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "2m", "30s", "500ms".
///
/// Supported units:
/// - `m` - minutes
/// - `s` - seconds
/// - `ms` - milliseconds
///
/// The input is case-insensitive and whitespace is trimmed.
///
/// # Examples
///
/// ```
/// use etrade_verifier::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(2 * 60));
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let (num, unit) = if s.ends_with("ms") {
        (s.trim_end_matches("ms"), "ms")
    } else if s.ends_with('m') {
        (s.trim_end_matches('m'), "m")
    } else if s.ends_with('s') {
        (s.trim_end_matches('s'), "s")
    } else {
        anyhow::bail!("Duration must end with m, s, or ms");
    };

    let num: u64 = num.parse().with_context(|| "Invalid number in duration")?;

    match unit {
        "m" => {
            let secs = num.checked_mul(60).context("Duration is too large")?;
            Ok(Duration::from_secs(secs))
        }
        "s" => Ok(Duration::from_secs(num)),
        "ms" => Ok(Duration::from_millis(num)),
        _ => unreachable!(),
    }
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}
