//! Metric names, keys and the aggregate summaries thresholds are evaluated on.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQS: &str = "http_reqs";
pub const CHECKS: &str = "checks";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const ITERATIONS: &str = "iterations";

/// Every metric recorded by a run, in report order.
pub const BUILTIN_METRICS: &[&str] = &[
    HTTP_REQ_DURATION,
    HTTP_REQ_FAILED,
    HTTP_REQS,
    CHECKS,
    ITERATION_DURATION,
    ITERATIONS,
];

/// How samples of a metric are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Distribution of values (latencies in milliseconds).
    Trend,
    /// Ratio of true samples to all samples.
    Rate,
    /// Monotonic count.
    Counter,
}

impl MetricKind {
    /// Kind of a built-in metric, `None` for unknown names.
    pub fn of(name: &str) -> Option<Self> {
        match name {
            HTTP_REQ_DURATION | ITERATION_DURATION => Some(Self::Trend),
            HTTP_REQ_FAILED | CHECKS => Some(Self::Rate),
            HTTP_REQS | ITERATIONS => Some(Self::Counter),
            _ => None,
        }
    }
}

/// Whether a metric is recorded per `name` tag (request name or check name).
pub fn supports_name_tag(name: &str) -> bool {
    matches!(name, HTTP_REQ_DURATION | HTTP_REQ_FAILED | HTTP_REQS | CHECKS)
}

/// Metric name with an optional `name` tag filter, e.g. `http_req_duration{name:fast}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey {
    pub name: String,
    pub tag: Option<String>,
}

impl MetricKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
        }
    }

    pub fn tagged(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: Some(tag.into()),
        }
    }

    /// Parses `metric` or `metric{name:value}`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let Some(open) = text.find('{') else {
            if text.is_empty() {
                return Err("metric name is empty".to_string());
            }
            return Ok(Self::new(text));
        };

        let name = text[..open].trim();
        let rest = &text[open + 1..];
        let Some(inner) = rest.strip_suffix('}') else {
            return Err(format!("unterminated tag filter in `{text}`"));
        };
        let Some((key, value)) = inner.split_once(':') else {
            return Err(format!("tag filter must look like `{{name:value}}`, got `{inner}`"));
        };
        if key.trim() != "name" {
            return Err(format!("only the `name` tag can be filtered on, got `{}`", key.trim()));
        }
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            return Err(format!("malformed metric key `{text}`"));
        }

        Ok(Self::tagged(name, value))
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}{{name:{}}}", self.name, tag),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for MetricKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Aggregate of a trend metric. Values are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl TrendSummary {
    /// Builds the summary from unsorted samples.
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.sort_unstable_by(f64::total_cmp);

        let mut summary = Self {
            count: samples.len() as u64,
            sorted: samples,
            ..Default::default()
        };
        if summary.sorted.is_empty() {
            return summary;
        }

        let sum: f64 = summary.sorted.iter().sum();
        summary.min = summary.sorted[0];
        summary.max = summary.sorted[summary.sorted.len() - 1];
        summary.avg = sum / summary.sorted.len() as f64;
        summary.med = summary.percentile(50.0);
        summary.p90 = summary.percentile(90.0);
        summary.p95 = summary.percentile(95.0);
        summary.p99 = summary.percentile(99.0);
        summary
    }

    /// Percentile `p` in `[0, 100]`, linearly interpolated between closest ranks.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }

        let rank = (p / 100.0).clamp(0.0, 1.0) * (self.sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;

        self.sorted[lower] + (self.sorted[upper] - self.sorted[lower]) * weight
    }
}

/// Aggregate of a rate metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateSummary {
    /// Samples that were true.
    pub passes: u64,
    /// All samples.
    pub total: u64,
}

impl RateSummary {
    pub fn fails(&self) -> u64 {
        self.total - self.passes
    }

    /// Share of true samples, 0.0 when nothing was recorded.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passes as f64 / self.total as f64
    }
}

/// Aggregate of a counter metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CounterSummary {
    pub count: u64,
    /// Count divided by the run's wall time.
    pub per_second: f64,
}

impl CounterSummary {
    pub fn new(count: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let per_second = if secs == 0.0 { 0.0 } else { count as f64 / secs };
        Self { count, per_second }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSummary {
    Trend(TrendSummary),
    Rate(RateSummary),
    Counter(CounterSummary),
}

impl MetricSummary {
    /// Summary of a metric that received no samples.
    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Trend => Self::Trend(TrendSummary::default()),
            MetricKind::Rate => Self::Rate(RateSummary::default()),
            MetricKind::Counter => Self::Counter(CounterSummary::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Trend(_) => MetricKind::Trend,
            Self::Rate(_) => MetricKind::Rate,
            Self::Counter(_) => MetricKind::Counter,
        }
    }
}

/// Pass/fail tally of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Point-in-time aggregate of every metric of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub metrics: BTreeMap<MetricKey, MetricSummary>,
    /// Per-check tallies in scenario order.
    pub checks: Vec<CheckTally>,
}

impl RunSummary {
    pub fn get(&self, key: &MetricKey) -> Option<&MetricSummary> {
        self.metrics.get(key)
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.metrics.get(&MetricKey::new(name)) {
            Some(MetricSummary::Trend(trend)) => Some(trend),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<RateSummary> {
        match self.metrics.get(&MetricKey::new(name)) {
            Some(MetricSummary::Rate(rate)) => Some(*rate),
            _ => None,
        }
    }

    pub fn counter(&self, name: &str) -> Option<CounterSummary> {
        match self.metrics.get(&MetricKey::new(name)) {
            Some(MetricSummary::Counter(counter)) => Some(*counter),
            _ => None,
        }
    }

    /// Total requests issued.
    pub fn request_count(&self) -> u64 {
        self.counter(HTTP_REQS).map(|c| c.count).unwrap_or(0)
    }

    /// Share of failed requests.
    pub fn error_rate(&self) -> f64 {
        self.rate(HTTP_REQ_FAILED).map(|r| r.rate()).unwrap_or(0.0)
    }
}

fn serialize_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_parse() {
        assert_eq!(MetricKey::parse("checks").unwrap(), MetricKey::new("checks"));
        assert_eq!(
            MetricKey::parse("http_req_duration{name:fast}").unwrap(),
            MetricKey::tagged("http_req_duration", "fast")
        );
        assert_eq!(
            MetricKey::parse(" http_reqs{ name: slow } ").unwrap(),
            MetricKey::tagged("http_reqs", "slow")
        );
        assert!(MetricKey::parse("http_reqs{status:200}").is_err());
        assert!(MetricKey::parse("http_reqs{name:fast").is_err());
        assert!(MetricKey::parse("").is_err());
    }

    #[test]
    fn test_metric_key_display() {
        assert_eq!(
            MetricKey::tagged("checks", "fast status 200").to_string(),
            "checks{name:fast status 200}"
        );
    }

    #[test]
    fn test_trend_percentiles_interpolate() {
        // 1..=100 ms
        let summary = TrendSummary::from_samples((1..=100).rev().map(f64::from).collect());

        assert_eq!(summary.count, 100);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 100.0);
        assert_eq!(summary.avg, 50.5);
        assert!((summary.med - 50.5).abs() < 1e-9);
        assert!((summary.p95 - 95.05).abs() < 1e-9);
        assert!((summary.percentile(0.0) - 1.0).abs() < 1e-9);
        assert!((summary.percentile(100.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_trend_is_zero() {
        let summary = TrendSummary::from_samples(Vec::new());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.percentile(95.0), 0.0);
        assert_eq!(summary.avg, 0.0);
    }

    #[test]
    fn test_rate_and_counter() {
        let rate = RateSummary {
            passes: 3,
            total: 12,
        };
        assert_eq!(rate.rate(), 0.25);
        assert_eq!(rate.fails(), 9);
        assert_eq!(RateSummary::default().rate(), 0.0);

        let counter = CounterSummary::new(1000, Duration::from_secs(10));
        assert_eq!(counter.per_second, 100.0);
        assert_eq!(CounterSummary::new(5, Duration::ZERO).per_second, 0.0);
    }

    #[test]
    fn test_builtin_kinds() {
        assert_eq!(MetricKind::of(HTTP_REQ_DURATION), Some(MetricKind::Trend));
        assert_eq!(MetricKind::of(HTTP_REQ_FAILED), Some(MetricKind::Rate));
        assert_eq!(MetricKind::of(ITERATIONS), Some(MetricKind::Counter));
        assert_eq!(MetricKind::of("vus"), None);
        assert!(supports_name_tag(CHECKS));
        assert!(!supports_name_tag(ITERATION_DURATION));
    }
}
