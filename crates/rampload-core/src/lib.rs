//! Core types for rampload: scenarios, ramp schedules, checks, metrics and thresholds.

pub mod accumulator;
pub mod check;
pub mod config;
pub mod duration;
pub mod error;
pub mod metrics;
pub mod scenario;
pub mod stage;
pub mod threshold;

pub use accumulator::MetricsRegistry;
pub use check::{Check, CheckCondition, ResponseSample};
pub use self::config::{DriverSettings, HttpSettings, LoggingSettings, RunnerSettings};
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use metrics::{MetricKey, MetricKind, MetricSummary, RunSummary, TrendSummary};
pub use scenario::{RequestStep, Scenario, ScenarioFile, Step, SAMPLE_SCENARIO};
pub use stage::{Stage, StageSchedule};
pub use threshold::{evaluate_all, Threshold, ThresholdVerdict};
