//! Per-response assertions.

use crate::error::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;

/// Outcome of a single request as seen by checks and metrics.
///
/// Transport failures (refused connection, timeout) are represented with
/// `status == 0` and `error` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSample {
    pub status: u16,
    pub duration: Duration,
    pub body_len: u64,
    /// Only retained when a body check needs it.
    pub body: Option<String>,
    pub error: Option<String>,
}

impl ResponseSample {
    pub fn ok(status: u16, duration: Duration) -> Self {
        Self {
            status,
            duration,
            body_len: 0,
            body: None,
            error: None,
        }
    }

    pub fn transport_error(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            status: 0,
            duration,
            body_len: 0,
            body: None,
            error: Some(error.into()),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body_len = body.len() as u64;
        self.body = Some(body);
        self
    }

    /// Whether the request counts towards `http_req_failed`.
    ///
    /// Anything outside 2xx/3xx, including transport errors, is a failure.
    pub fn is_failure(&self) -> bool {
        !(200..400).contains(&self.status)
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckCondition {
    StatusEquals(u16),
    /// Strictly below the bound.
    DurationBelow(Duration),
    BodyContains(String),
}

/// Named predicate over a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: String,
    pub condition: CheckCondition,
}

impl Check {
    pub fn status(name: impl Into<String>, status: u16) -> Self {
        Self {
            name: name.into(),
            condition: CheckCondition::StatusEquals(status),
        }
    }

    pub fn duration_below(name: impl Into<String>, bound: Duration) -> Self {
        Self {
            name: name.into(),
            condition: CheckCondition::DurationBelow(bound),
        }
    }

    pub fn body_contains(name: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: CheckCondition::BodyContains(needle.into()),
        }
    }

    /// Never panics; an error response simply fails status and body checks.
    pub fn evaluate(&self, response: &ResponseSample) -> bool {
        match &self.condition {
            CheckCondition::StatusEquals(status) => response.status == *status,
            CheckCondition::DurationBelow(bound) => response.duration < *bound,
            CheckCondition::BodyContains(needle) => response
                .body
                .as_deref()
                .map(|body| body.contains(needle.as_str()))
                .unwrap_or(false),
        }
    }

    pub fn needs_body(&self) -> bool {
        matches!(self.condition, CheckCondition::BodyContains(_))
    }
}

/// Check as written in a scenario file. Exactly one condition must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub max_duration_ms: Option<f64>,
    #[serde(default)]
    pub body_contains: Option<String>,
}

impl CheckConfig {
    pub fn validate(&self) -> ConfigResult<Check> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid_check(&self.name, "name must not be empty"));
        }

        let mut conditions = Vec::new();
        if let Some(status) = self.status {
            conditions.push(CheckCondition::StatusEquals(status));
        }
        if let Some(ms) = self.max_duration_ms {
            if !ms.is_finite() || ms < 0.0 {
                return Err(ConfigError::invalid_check(
                    name,
                    format!("max_duration_ms must be a non-negative number, got {ms}"),
                ));
            }
            let bound = Duration::try_from_secs_f64(ms / 1000.0).map_err(|e| {
                ConfigError::invalid_check(name, format!("max_duration_ms {ms} is out of range: {e}"))
            })?;
            conditions.push(CheckCondition::DurationBelow(bound));
        }
        if let Some(needle) = &self.body_contains {
            conditions.push(CheckCondition::BodyContains(needle.clone()));
        }

        if conditions.len() != 1 {
            return Err(ConfigError::invalid_check(
                name,
                format!(
                    "exactly one of `status`, `max_duration_ms`, `body_contains` is required, found {}",
                    conditions.len()
                ),
            ));
        }

        Ok(Check {
            name: name.to_string(),
            condition: conditions.remove(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_check_on_server_error() {
        let check = Check::status("fast status 200", 200);
        let response = ResponseSample::ok(500, Duration::from_millis(12));

        assert!(!check.evaluate(&response));
        assert!(response.is_failure());
    }

    #[test]
    fn test_checks_on_transport_error() {
        let response = ResponseSample::transport_error(Duration::from_millis(3), "connection refused");

        assert!(!Check::status("status", 200).evaluate(&response));
        assert!(!Check::body_contains("body", "ok").evaluate(&response));
        // latency bound still holds for a fast failure
        assert!(Check::duration_below("fast", Duration::from_millis(200)).evaluate(&response));
        assert!(response.is_failure());
    }

    #[test]
    fn test_duration_bound_is_strict() {
        let check = Check::duration_below("under 200ms", Duration::from_millis(200));

        assert!(check.evaluate(&ResponseSample::ok(200, Duration::from_millis(199))));
        assert!(!check.evaluate(&ResponseSample::ok(200, Duration::from_millis(200))));
    }

    #[test]
    fn test_body_contains() {
        let check = Check::body_contains("body", "concluido");
        let response = ResponseSample::ok(200, Duration::from_millis(1)).with_body("processing concluido 42");
        assert!(check.evaluate(&response));
        assert_eq!(response.body_len, 23);
        assert!(check.needs_body());
    }

    #[test]
    fn test_redirects_are_not_failures() {
        assert!(!ResponseSample::ok(302, Duration::ZERO).is_failure());
        assert!(ResponseSample::ok(404, Duration::ZERO).is_failure());
    }

    #[test]
    fn test_out_of_range_duration_bound_rejected() {
        let config = CheckConfig {
            name: "slow".to_string(),
            max_duration_ms: Some(1e30),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCheck { .. })));
    }

    #[test]
    fn test_config_requires_exactly_one_condition() {
        let none = CheckConfig {
            name: "empty".to_string(),
            ..Default::default()
        };
        assert!(none.validate().is_err());

        let two = CheckConfig {
            name: "two".to_string(),
            status: Some(200),
            max_duration_ms: Some(100.0),
            ..Default::default()
        };
        assert!(two.validate().is_err());

        let unnamed = CheckConfig {
            name: "  ".to_string(),
            status: Some(200),
            ..Default::default()
        };
        assert!(unnamed.validate().is_err());

        let ok = CheckConfig {
            name: "slow duration < 1000ms".to_string(),
            max_duration_ms: Some(1000.0),
            ..Default::default()
        };
        assert_eq!(
            ok.validate().unwrap(),
            Check::duration_below("slow duration < 1000ms", Duration::from_secs(1))
        );
    }
}
