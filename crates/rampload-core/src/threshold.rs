//! Threshold expressions such as `p(95)<500` or `rate<0.01`.
//!
//! A threshold is a predicate over one aggregate of one metric. Comparisons are
//! strict as written: `rate<0.01` fails when the observed rate is exactly 0.01.

use crate::error::{ConfigError, ConfigResult};
use crate::metrics::{MetricKey, MetricKind, MetricSummary, RunSummary};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Aggregate a threshold reads from a metric summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Percentile in `[0, 100]`.
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
    Count,
}

impl Aggregation {
    /// Whether this aggregate exists for metrics of `kind`.
    pub fn applies_to(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Trend => !matches!(self, Self::Rate),
            MetricKind::Rate | MetricKind::Counter => matches!(self, Self::Rate | Self::Count),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "avg" => return Ok(Self::Avg),
            "min" => return Ok(Self::Min),
            "max" => return Ok(Self::Max),
            "med" => return Ok(Self::Med),
            "rate" => return Ok(Self::Rate),
            "count" => return Ok(Self::Count),
            _ => {}
        }

        let inner = s
            .strip_prefix("p(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| format!("unknown aggregation `{s}`"))?;
        let p: f64 = inner
            .trim()
            .parse()
            .map_err(|_| format!("invalid percentile `{inner}`"))?;
        if !(0.0..=100.0).contains(&p) {
            return Err(format!("percentile must be within 0..=100, got {p}"));
        }
        Ok(Self::Percentile(p))
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => write!(f, "p({p})"),
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::Rate => f.write_str("rate"),
            Self::Count => f.write_str("count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Self::Lt => observed < expected,
            Self::Le => observed <= expected,
            Self::Gt => observed > expected,
            Self::Ge => observed >= expected,
            Self::Eq => observed == expected,
            Self::Ne => observed != expected,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// Parsed `aggregation operator value` predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub value: f64,
}

impl FromStr for ThresholdExpr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op_start = s
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| "missing comparison operator".to_string())?;
        let (left, rest) = s.split_at(op_start);

        let (comparison, right) = if let Some(r) = rest.strip_prefix("<=") {
            (Comparison::Le, r)
        } else if let Some(r) = rest.strip_prefix(">=") {
            (Comparison::Ge, r)
        } else if let Some(r) = rest.strip_prefix("==") {
            (Comparison::Eq, r)
        } else if let Some(r) = rest.strip_prefix("!=") {
            (Comparison::Ne, r)
        } else if let Some(r) = rest.strip_prefix('<') {
            (Comparison::Lt, r)
        } else if let Some(r) = rest.strip_prefix('>') {
            (Comparison::Gt, r)
        } else {
            return Err(format!("unknown comparison operator in `{rest}`"));
        };

        let aggregation = left.parse::<Aggregation>()?;
        let right = right.trim();
        let value: f64 = right
            .parse()
            .map_err(|_| format!("invalid threshold value `{right}`"))?;
        if !value.is_finite() {
            return Err(format!("threshold value must be finite, got `{right}`"));
        }

        Ok(Self {
            aggregation,
            comparison,
            value,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.comparison.symbol(), self.value)
    }
}

/// A validated threshold bound to a metric key.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: MetricKey,
    pub expr: ThresholdExpr,
    /// Expression as written in the configuration.
    pub source: String,
}

impl Threshold {
    /// Parses and validates a threshold against the built-in metrics.
    pub fn parse(metric: &str, expression: &str) -> ConfigResult<Self> {
        let invalid = |message: String| ConfigError::invalid_threshold(metric, expression, message);

        let key = MetricKey::parse(metric).map_err(invalid)?;
        let kind = MetricKind::of(&key.name)
            .ok_or_else(|| invalid(format!("unknown metric `{}`", key.name)))?;
        if key.tag.is_some() && !crate::metrics::supports_name_tag(&key.name) {
            return Err(invalid(format!(
                "metric `{}` is not recorded per name",
                key.name
            )));
        }

        let expr = expression.parse::<ThresholdExpr>().map_err(invalid)?;
        if !expr.aggregation.applies_to(kind) {
            return Err(invalid(format!(
                "`{}` is not available on {:?} metrics",
                expr.aggregation, kind
            )));
        }

        Ok(Self {
            metric: key,
            expr,
            source: expression.trim().to_string(),
        })
    }

    /// Reads the aggregate this threshold compares against.
    pub fn observe(&self, summary: &MetricSummary) -> f64 {
        match (summary, self.expr.aggregation) {
            (MetricSummary::Trend(t), Aggregation::Percentile(p)) => t.percentile(p),
            (MetricSummary::Trend(t), Aggregation::Avg) => t.avg,
            (MetricSummary::Trend(t), Aggregation::Min) => t.min,
            (MetricSummary::Trend(t), Aggregation::Max) => t.max,
            (MetricSummary::Trend(t), Aggregation::Med) => t.med,
            (MetricSummary::Trend(t), Aggregation::Count) => t.count as f64,
            (MetricSummary::Rate(r), Aggregation::Rate) => r.rate(),
            (MetricSummary::Rate(r), Aggregation::Count) => r.passes as f64,
            (MetricSummary::Counter(c), Aggregation::Count) => c.count as f64,
            (MetricSummary::Counter(c), Aggregation::Rate) => c.per_second,
            // rejected by `parse`
            _ => f64::NAN,
        }
    }

    /// Evaluates the predicate against a run summary.
    ///
    /// A metric that received no samples is evaluated as an empty summary.
    pub fn evaluate(&self, summary: &RunSummary) -> ThresholdVerdict {
        let observed = match summary.get(&self.metric) {
            Some(metric) => self.observe(metric),
            None => {
                let kind = MetricKind::of(&self.metric.name).unwrap_or(MetricKind::Counter);
                self.observe(&MetricSummary::empty(kind))
            }
        };
        let passed = self.expr.comparison.holds(observed, self.expr.value);

        ThresholdVerdict {
            metric: self.metric.clone(),
            expression: self.source.clone(),
            observed,
            passed,
        }
    }
}

/// Result of one threshold at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdVerdict {
    pub metric: MetricKey,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

/// Evaluates every threshold; the run passes only if all of them pass.
pub fn evaluate_all(thresholds: &[Threshold], summary: &RunSummary) -> Vec<ThresholdVerdict> {
    thresholds.iter().map(|t| t.evaluate(summary)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{RateSummary, TrendSummary, HTTP_REQ_DURATION, HTTP_REQ_FAILED};

    fn failure_summary(failed: u64, total: u64) -> RunSummary {
        let mut summary = RunSummary::default();
        summary.metrics.insert(
            MetricKey::new(HTTP_REQ_FAILED),
            MetricSummary::Rate(RateSummary {
                passes: failed,
                total,
            }),
        );
        summary
    }

    #[test]
    fn test_parse_expressions() {
        let expr: ThresholdExpr = "p(95)<500".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(expr.comparison, Comparison::Lt);
        assert_eq!(expr.value, 500.0);

        let expr: ThresholdExpr = " rate <= 0.01 ".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Rate);
        assert_eq!(expr.comparison, Comparison::Le);

        let expr: ThresholdExpr = "p(99.9)>=1".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(99.9));

        assert!("p(101)<5".parse::<ThresholdExpr>().is_err());
        assert!("p95<5".parse::<ThresholdExpr>().is_err());
        assert!("avg 5".parse::<ThresholdExpr>().is_err());
        assert!("avg<abc".parse::<ThresholdExpr>().is_err());
        assert!("avg=<5".parse::<ThresholdExpr>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for source in ["p(95)<500", "rate<0.01", "count>=10", "med!=3"] {
            let expr: ThresholdExpr = source.parse().unwrap();
            assert_eq!(expr.to_string(), source);
        }
    }

    #[test]
    fn test_rate_threshold_boundary_is_strict() {
        let threshold = Threshold::parse(HTTP_REQ_FAILED, "rate<0.01").unwrap();

        assert!(threshold.evaluate(&failure_summary(0, 1000)).passed);
        assert!(threshold.evaluate(&failure_summary(9, 1000)).passed);
        // exactly 1% fails
        assert!(!threshold.evaluate(&failure_summary(10, 1000)).passed);
        assert!(!threshold.evaluate(&failure_summary(11, 1000)).passed);
    }

    #[test]
    fn test_percentile_threshold() {
        let mut summary = RunSummary::default();
        summary.metrics.insert(
            MetricKey::new(HTTP_REQ_DURATION),
            MetricSummary::Trend(TrendSummary::from_samples(
                (0..100).map(|i| f64::from(i) * 10.0).collect(),
            )),
        );

        let passing = Threshold::parse(HTTP_REQ_DURATION, "p(95)<950").unwrap();
        let verdict = passing.evaluate(&summary);
        assert!(verdict.passed);
        assert!((verdict.observed - 940.5).abs() < 1e-9);

        let failing = Threshold::parse(HTTP_REQ_DURATION, "max<900").unwrap();
        assert!(!failing.evaluate(&summary).passed);
    }

    #[test]
    fn test_kind_validation() {
        assert!(Threshold::parse(HTTP_REQ_DURATION, "rate<0.1").is_err());
        assert!(Threshold::parse(HTTP_REQ_FAILED, "p(95)<0.1").is_err());
        assert!(Threshold::parse("http_reqs", "count>10").is_ok());
        assert!(Threshold::parse("http_reqs", "avg>10").is_err());
        assert!(Threshold::parse("vus", "count>10").is_err());
        assert!(Threshold::parse("iterations{name:fast}", "count>10").is_err());
        assert!(Threshold::parse("http_req_duration{name:fast}", "p(90)<200").is_ok());
    }

    #[test]
    fn test_missing_metric_evaluates_as_empty() {
        let threshold = Threshold::parse("http_reqs", "count>0").unwrap();
        let verdict = threshold.evaluate(&RunSummary::default());
        assert_eq!(verdict.observed, 0.0);
        assert!(!verdict.passed);
    }
}
