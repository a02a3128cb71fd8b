//! Report generation for load test results

use crate::error::{RunError, RunResult};
use chrono::{DateTime, Utc};
use rampload_core::metrics::{
    MetricSummary, BUILTIN_METRICS, CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
    HTTP_REQS, ITERATIONS, ITERATION_DURATION,
};
use rampload_core::{format_duration, MetricKey, RunSummary, ThresholdVerdict, TrendSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub verdicts: Vec<ThresholdVerdict>,
    /// Iterations still running when `graceful_stop` expired.
    pub interrupted_iterations: u64,
    /// True when every threshold passed.
    pub passed: bool,
}

impl RunOutcome {
    pub fn elapsed(&self) -> Duration {
        self.summary.elapsed
    }

    pub fn failed_verdicts(&self) -> impl Iterator<Item = &ThresholdVerdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
    Json,
}

/// Result writer for generating load test reports
pub struct ResultWriter<'a> {
    outcome: &'a RunOutcome,
}

impl<'a> ResultWriter<'a> {
    pub fn new(outcome: &'a RunOutcome) -> Self {
        Self { outcome }
    }

    /// Check if all thresholds passed
    pub fn passes(&self) -> bool {
        self.outcome.passed
    }

    /// One line per failed threshold
    pub fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .outcome
            .failed_verdicts()
            .map(|v| format!("{} {} (observed {})", v.metric, v.expression, format_value(v.observed)))
            .collect();
        if failures.is_empty() {
            return "All thresholds passed".to_string();
        }
        failures.join("\n")
    }

    pub fn render(&self, format: ReportFormat) -> RunResult<String> {
        match format {
            ReportFormat::Text => Ok(self.generate_text()),
            ReportFormat::Markdown => Ok(self.generate_markdown()),
            ReportFormat::Json => self.generate_json(),
        }
    }

    /// Write report to file
    pub fn write_report(&self, path: impl AsRef<Path>, format: ReportFormat) -> RunResult<()> {
        let path = path.as_ref();
        let content = self.render(format)?;
        std::fs::write(path, content).map_err(|source| RunError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), ?format, "Report written");
        Ok(())
    }

    /// End-of-test summary for the terminal
    fn generate_text(&self) -> String {
        let outcome = self.outcome;
        let summary = &outcome.summary;
        let mut out = String::new();

        let _ = writeln!(out);
        let _ = writeln!(out, "  scenario: {} (run {})", outcome.scenario, outcome.run_id);
        let _ = writeln!(
            out,
            "  duration: {}, interrupted iterations: {}",
            format_elapsed(outcome.elapsed()),
            outcome.interrupted_iterations
        );
        let _ = writeln!(out);

        if !outcome.verdicts.is_empty() {
            let _ = writeln!(out, "  thresholds");
            for verdict in &outcome.verdicts {
                let _ = writeln!(
                    out,
                    "    {} {} {} observed={}",
                    if verdict.passed { "✓" } else { "✗" },
                    verdict.metric,
                    verdict.expression,
                    format_value(verdict.observed)
                );
            }
            let _ = writeln!(out);
        }

        for name in BUILTIN_METRICS {
            let key = MetricKey::new(*name);
            if let Some(metric) = summary.get(&key) {
                let _ = writeln!(out, "  {}: {}", dotted(name, 28), describe(name, metric));
            }
            if *name == CHECKS {
                for check in &summary.checks {
                    let _ = writeln!(
                        out,
                        "    {} ✓ {} ✗ {}",
                        dotted(&check.name, 30),
                        check.passes,
                        check.fails
                    );
                }
            }
        }

        let tagged: Vec<_> = summary
            .metrics
            .iter()
            .filter(|(key, _)| key.tag.is_some() && key.name != CHECKS)
            .collect();
        if !tagged.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  per request");
            for (key, metric) in tagged {
                let _ = writeln!(
                    out,
                    "    {}: {}",
                    dotted(&key.to_string(), 40),
                    describe(&key.name, metric)
                );
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {}",
            if outcome.passed {
                "✅ all thresholds passed"
            } else {
                "❌ some thresholds failed"
            }
        );
        out
    }

    /// Generate Markdown report
    fn generate_markdown(&self) -> String {
        let outcome = self.outcome;
        let summary = &outcome.summary;
        let trend = summary.trend(HTTP_REQ_DURATION).cloned().unwrap_or_default();
        let iteration = summary.trend(ITERATION_DURATION).cloned().unwrap_or_default();
        let checks = summary.rate(CHECKS).unwrap_or_default();

        let mut out = String::new();
        let _ = writeln!(out, "# Load Test Report: {}\n", outcome.scenario);
        let _ = writeln!(
            out,
            "**Status**: {} {}\n",
            if outcome.passed { "✅" } else { "❌" },
            if outcome.passed { "PASSED" } else { "FAILED" }
        );
        let _ = writeln!(out, "---\n\n## Summary\n");
        let _ = writeln!(out, "- **Run ID**: {}", outcome.run_id);
        let _ = writeln!(
            out,
            "- **Started**: {}",
            outcome.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "- **Duration**: {}", format_elapsed(outcome.elapsed()));
        let _ = writeln!(out, "- **Total Requests**: {}", summary.request_count());
        let _ = writeln!(
            out,
            "- **Throughput**: {:.1} req/s",
            summary.counter(HTTP_REQS).map(|c| c.per_second).unwrap_or(0.0)
        );
        let _ = writeln!(out, "- **Error Rate**: {:.4}%", summary.error_rate() * 100.0);
        let _ = writeln!(
            out,
            "- **Iterations**: {} ({} interrupted)",
            summary.counter(ITERATIONS).map(|c| c.count).unwrap_or(0),
            outcome.interrupted_iterations
        );

        let _ = writeln!(out, "\n---\n\n## Thresholds\n");
        if outcome.verdicts.is_empty() {
            let _ = writeln!(out, "No thresholds configured");
        } else {
            let _ = writeln!(out, "| Metric | Threshold | Observed | Status |");
            let _ = writeln!(out, "|--------|-----------|----------|--------|");
            for verdict in &outcome.verdicts {
                let _ = writeln!(
                    out,
                    "| `{}` | `{}` | {} | {} |",
                    verdict.metric,
                    verdict.expression,
                    format_value(verdict.observed),
                    if verdict.passed { "✅" } else { "❌" }
                );
            }
        }

        let _ = writeln!(out, "\n---\n\n## Latency\n");
        let _ = writeln!(out, "| Statistic | http_req_duration | iteration_duration |");
        let _ = writeln!(out, "|-----------|-------------------|--------------------|");
        for (label, req, iter) in [
            ("Min", trend.min, iteration.min),
            ("Avg", trend.avg, iteration.avg),
            ("P50", trend.med, iteration.med),
            ("P90", trend.p90, iteration.p90),
            ("P95", trend.p95, iteration.p95),
            ("P99", trend.p99, iteration.p99),
            ("Max", trend.max, iteration.max),
        ] {
            let _ = writeln!(out, "| {label} | {req:.2}ms | {iter:.2}ms |");
        }

        let _ = writeln!(out, "\n---\n\n## Requests\n");
        let _ = writeln!(out, "| Request | Count | Failed | P95 |");
        let _ = writeln!(out, "|---------|-------|--------|-----|");
        for (key, metric) in &summary.metrics {
            let (Some(name), MetricSummary::Counter(counter)) = (&key.tag, metric) else {
                continue;
            };
            if key.name != HTTP_REQS {
                continue;
            }
            let failed = summary
                .get(&MetricKey::tagged(HTTP_REQ_FAILED, name))
                .and_then(|m| match m {
                    MetricSummary::Rate(r) => Some(r.passes),
                    _ => None,
                })
                .unwrap_or(0);
            let p95 = summary
                .get(&MetricKey::tagged(HTTP_REQ_DURATION, name))
                .and_then(|m| match m {
                    MetricSummary::Trend(t) => Some(t.p95),
                    _ => None,
                })
                .unwrap_or(0.0);
            let _ = writeln!(out, "| {name} | {} | {failed} | {p95:.2}ms |", counter.count);
        }

        let _ = writeln!(out, "\n---\n\n## Checks\n");
        let _ = writeln!(
            out,
            "**Pass rate**: {:.2}% ({} of {})\n",
            checks.rate() * 100.0,
            checks.passes,
            checks.total
        );
        if !summary.checks.is_empty() {
            let _ = writeln!(out, "| Check | Passed | Failed |");
            let _ = writeln!(out, "|-------|--------|--------|");
            for check in &summary.checks {
                let _ = writeln!(out, "| {} | {} | {} |", check.name, check.passes, check.fails);
            }
        }

        let _ = writeln!(
            out,
            "\n---\n\n**Report Generated**: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        out
    }

    /// Generate JSON report
    fn generate_json(&self) -> RunResult<String> {
        Ok(serde_json::to_string_pretty(self.outcome)?)
    }
}

/// Name padded with dots, k6 style.
fn dotted(name: &str, width: usize) -> String {
    let len = name.chars().count();
    if len >= width {
        return name.to_string();
    }
    format!("{name}{}", ".".repeat(width - len))
}

fn describe(name: &str, metric: &MetricSummary) -> String {
    match metric {
        MetricSummary::Trend(trend) => describe_trend(trend),
        MetricSummary::Rate(rate) => {
            // http_req_failed counts failures as its true samples
            let (ok_label, fail_label) = if name == HTTP_REQ_FAILED {
                ("failed", "ok")
            } else {
                ("✓", "✗")
            };
            format!(
                "{:.2}% {} {} {} {}",
                rate.rate() * 100.0,
                ok_label,
                rate.passes,
                fail_label,
                rate.fails()
            )
        }
        MetricSummary::Counter(counter) => {
            format!("{} {:.2}/s", counter.count, counter.per_second)
        }
    }
}

fn describe_trend(trend: &TrendSummary) -> String {
    format!(
        "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={}",
        format_ms(trend.avg),
        format_ms(trend.min),
        format_ms(trend.med),
        format_ms(trend.max),
        format_ms(trend.p90),
        format_ms(trend.p95),
        format_ms(trend.p99)
    )
}

fn format_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.2}ms")
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// Rounds to whole milliseconds before formatting.
fn format_elapsed(elapsed: Duration) -> String {
    format_duration(Duration::from_millis(elapsed.as_millis() as u64))
}
