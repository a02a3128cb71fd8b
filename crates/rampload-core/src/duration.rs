//! Duration values as written in scenario files.
//!
//! Accepted forms: humantime strings (`"30s"`, `"1m"`, `"1m30s"`, `"250ms"`),
//! integer seconds and float seconds.

use serde::Deserialize;
use std::time::Duration;

/// Unvalidated duration as it appears in a config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Seconds(i64),
    FractionalSeconds(f64),
    Text(String),
}

impl RawDuration {
    /// Resolves the raw value into a `Duration`.
    ///
    /// Negative and non-finite values are rejected.
    pub fn resolve(&self) -> Result<Duration, String> {
        match self {
            Self::Seconds(secs) => {
                if *secs < 0 {
                    return Err(format!("duration must not be negative, got {secs}"));
                }
                Ok(Duration::from_secs(*secs as u64))
            }
            Self::FractionalSeconds(secs) => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(format!(
                        "duration must be a non-negative, finite number, got {secs}"
                    ));
                }
                Duration::try_from_secs_f64(*secs)
                    .map_err(|e| format!("duration {secs}s is out of range: {e}"))
            }
            Self::Text(text) => parse_duration(text),
        }
    }
}

/// Parses a humantime duration string. A bare number is read as seconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(format!("duration must not be negative, got `{trimmed}`"));
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).map_err(|e| format!("invalid duration `{trimmed}`: {e}"))
}

/// Formats a duration the way it is accepted back by [`parse_duration`].
pub fn format_duration(value: Duration) -> String {
    humantime::format_duration(value).to_string()
}
