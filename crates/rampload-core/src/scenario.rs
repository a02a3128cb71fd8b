//! Scenario files: stages, thresholds and the per-iteration step list.
//!
//! Scenario files are TOML (or JSON when the file ends in `.json`). They are
//! parsed into raw `*Config` structs and validated into an immutable
//! [`Scenario`] before any traffic is generated.

use crate::check::{Check, CheckConfig};
use crate::duration::RawDuration;
use crate::error::{ConfigError, ConfigResult};
use crate::metrics::CHECKS;
use crate::stage::{StageConfig, StageSchedule};
use crate::threshold::Threshold;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `base_url` after a scenario is loaded.
pub const BASE_URL_ENV: &str = "RAMPLOAD_BASE_URL";

const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Sample scenario: ramp to 100 VUs against the fast, slow and heavy endpoints.
pub const SAMPLE_SCENARIO: &str = r#"# Ramp up to 100 virtual users against three endpoints with
# different latency profiles, then ramp back down.
name = "basic"
base_url = "http://localhost:8080"

[[stages]]
duration = "30s"
target = 10

[[stages]]
duration = "1m"
target = 50

[[stages]]
duration = "30s"
target = 100

[[stages]]
duration = "1m"
target = 100

[[stages]]
duration = "30s"
target = 0

[thresholds]
http_req_duration = ["p(95)<500"]
http_req_failed = ["rate<0.01"]

[[scenario.steps]]
request = { name = "fast", path = "/api/fast" }
checks = [
    { name = "fast status 200", status = 200 },
    { name = "fast duration < 200ms", max_duration_ms = 200 },
]

[[scenario.steps]]
sleep = "1s"

[[scenario.steps]]
request = { name = "slow", path = "/api/slow" }
checks = [
    { name = "slow status 200", status = 200 },
    { name = "slow duration < 1000ms", max_duration_ms = 1000 },
]

[[scenario.steps]]
sleep = "1s"

[[scenario.steps]]
request = { name = "heavy", path = "/api/heavy" }
checks = [
    { name = "heavy status 200", status = 200 },
    { name = "heavy duration < 1000ms", max_duration_ms = 1000 },
]

[[scenario.steps]]
sleep = "1s"
"#;

/// Scenario file as written, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub start_vus: i64,
    /// Total iteration budget shared by all VUs.
    #[serde(default)]
    pub iterations: Option<u64>,
    #[serde(default)]
    pub graceful_stop: Option<RawDuration>,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdList>,
    pub scenario: StepsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThresholdList {
    One(String),
    Many(Vec<String>),
}

impl ThresholdList {
    fn expressions(&self) -> Vec<&str> {
        match self {
            Self::One(expr) => vec![expr.as_str()],
            Self::Many(exprs) => exprs.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepsConfig {
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Request {
        request: RequestConfig,
        #[serde(default)]
        checks: Vec<CheckConfig>,
    },
    Sleep {
        sleep: RawDuration,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    pub name: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

impl ScenarioFile {
    /// Reads a scenario file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let parsed: Result<Self, String> = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// The built-in fast/slow/heavy scenario.
    pub fn sample() -> ConfigResult<Self> {
        Self::from_toml_str(SAMPLE_SCENARIO)
    }

    /// Applies `RAMPLOAD_BASE_URL` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.base_url = Some(base_url);
            }
        }
    }
}

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// Joined onto the scenario's base URL.
    Path(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCheck {
    /// Position among all checks of the scenario.
    pub id: usize,
    pub check: Check,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestStep {
    /// Position among all requests of the scenario.
    pub id: usize,
    pub name: String,
    pub url: String,
    pub checks: Vec<ScenarioCheck>,
}

impl RequestStep {
    pub fn needs_body(&self) -> bool {
        self.checks.iter().any(|c| c.check.needs_body())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Request(RequestStep),
    Pause(Duration),
}

/// Validated, immutable scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub schedule: StageSchedule,
    pub thresholds: Vec<Threshold>,
    pub steps: Vec<Step>,
    pub iterations: Option<u64>,
    pub graceful_stop: Duration,
}

impl Scenario {
    /// Loads, applies environment overrides and validates a scenario file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let mut file = ScenarioFile::from_path(path)?;
        file.apply_env_overrides();
        let scenario = Self::from_file(&file)?;
        tracing::debug!(
            path = %path.display(),
            name = %scenario.name,
            schedule = %scenario.schedule.description(),
            "Loaded scenario"
        );
        Ok(scenario)
    }

    pub fn from_file(file: &ScenarioFile) -> ConfigResult<Self> {
        let schedule = StageSchedule::from_config(file.start_vus, &file.stages)?;

        if file.iterations == Some(0) {
            return Err(ConfigError::InvalidScenario(
                "iterations must be greater than zero when set".to_string(),
            ));
        }

        let graceful_stop = match &file.graceful_stop {
            Some(raw) => raw
                .resolve()
                .map_err(|e| ConfigError::InvalidScenario(format!("graceful_stop: {e}")))?,
            None => DEFAULT_GRACEFUL_STOP,
        };

        let base_url = file
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/').to_string());

        let mut steps = Vec::with_capacity(file.scenario.steps.len());
        let mut request_names = HashSet::new();
        let mut check_names = HashSet::new();
        let mut next_check = 0;

        for step in &file.scenario.steps {
            match step {
                StepConfig::Sleep { sleep } => {
                    let pause = sleep
                        .resolve()
                        .map_err(|e| ConfigError::InvalidScenario(format!("sleep: {e}")))?;
                    steps.push(Step::Pause(pause));
                }
                StepConfig::Request { request, checks } => {
                    let name = request.name.trim().to_string();
                    if name.is_empty() {
                        return Err(ConfigError::InvalidScenario(
                            "request name must not be empty".to_string(),
                        ));
                    }
                    if !request_names.insert(name.clone()) {
                        return Err(ConfigError::InvalidScenario(format!(
                            "duplicate request name `{name}`"
                        )));
                    }
                    if !request.method.eq_ignore_ascii_case("GET") {
                        return Err(ConfigError::InvalidScenario(format!(
                            "request `{name}`: unsupported method `{}`",
                            request.method
                        )));
                    }

                    let target = match (&request.path, &request.url) {
                        (Some(path), None) => RequestTarget::Path(path.clone()),
                        (None, Some(url)) => RequestTarget::Url(url.clone()),
                        _ => {
                            return Err(ConfigError::InvalidScenario(format!(
                                "request `{name}`: exactly one of `path` or `url` is required"
                            )))
                        }
                    };
                    let url = resolve_url(&name, &target, base_url.as_deref())?;

                    let mut scenario_checks = Vec::with_capacity(checks.len());
                    for config in checks {
                        let check = config.validate()?;
                        if !check_names.insert(check.name.clone()) {
                            return Err(ConfigError::invalid_check(
                                &check.name,
                                "check names must be unique within a scenario",
                            ));
                        }
                        scenario_checks.push(ScenarioCheck {
                            id: next_check,
                            check,
                        });
                        next_check += 1;
                    }

                    steps.push(Step::Request(RequestStep {
                        id: request_names.len() - 1,
                        name,
                        url,
                        checks: scenario_checks,
                    }));
                }
            }
        }

        if request_names.is_empty() {
            return Err(ConfigError::InvalidScenario(
                "scenario must contain at least one request".to_string(),
            ));
        }

        let mut thresholds = Vec::new();
        for (metric, list) in &file.thresholds {
            for expression in list.expressions() {
                let threshold = Threshold::parse(metric, expression)?;
                if let Some(tag) = &threshold.metric.tag {
                    let known = if threshold.metric.name == CHECKS {
                        check_names.contains(tag)
                    } else {
                        request_names.contains(tag)
                    };
                    if !known {
                        return Err(ConfigError::invalid_threshold(
                            metric.as_str(),
                            expression,
                            format!("no request or check named `{tag}`"),
                        ));
                    }
                }
                thresholds.push(threshold);
            }
        }

        Ok(Self {
            name: file.name.clone(),
            schedule,
            thresholds,
            steps,
            iterations: file.iterations,
            graceful_stop,
        })
    }

    pub fn requests(&self) -> impl Iterator<Item = &RequestStep> {
        self.steps.iter().filter_map(|step| match step {
            Step::Request(request) => Some(request),
            Step::Pause(_) => None,
        })
    }

    /// Request names indexed by `RequestStep::id`.
    pub fn request_names(&self) -> Vec<String> {
        self.requests().map(|r| r.name.clone()).collect()
    }

    /// Check names indexed by `ScenarioCheck::id`.
    pub fn check_names(&self) -> Vec<String> {
        self.requests()
            .flat_map(|r| r.checks.iter().map(|c| c.check.name.clone()))
            .collect()
    }

    /// Sum of all pauses of one iteration.
    pub fn pause_per_iteration(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Pause(pause) => *pause,
                Step::Request(_) => Duration::ZERO,
            })
            .sum()
    }
}

fn resolve_url(name: &str, target: &RequestTarget, base_url: Option<&str>) -> ConfigResult<String> {
    match target {
        RequestTarget::Url(url) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidScenario(format!(
                    "request `{name}`: url must start with http:// or https://"
                )));
            }
            Ok(url.clone())
        }
        RequestTarget::Path(path) => {
            let base = base_url.ok_or_else(|| {
                ConfigError::InvalidScenario(format!(
                    "request `{name}` uses a path but no base_url is configured"
                ))
            })?;
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidScenario(format!(
                    "request `{name}`: path must start with `/`"
                )));
            }
            Ok(format!("{base}{path}"))
        }
    }
}
