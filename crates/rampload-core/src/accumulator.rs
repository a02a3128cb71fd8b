//! Concurrency-safe metric accumulators shared by all virtual users.
//!
//! Counters and rates are plain atomics. Trends are sharded: each VU writes to
//! shard `vu_id % shards`, so VUs rarely contend on the same lock, and shards are
//! merged only when a snapshot is taken.

use crate::check::ResponseSample;
use crate::metrics::{
    CheckTally, CounterSummary, MetricKey, MetricSummary, RateSummary, RunSummary, TrendSummary,
    CHECKS, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Boolean samples; `passes` counts the true ones.
#[derive(Debug, Default)]
pub struct RateCounter {
    passes: AtomicU64,
    total: AtomicU64,
}

impl RateCounter {
    pub fn record(&self, value: bool) {
        if value {
            self.passes.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads both counters. Concurrent writers may make the pair momentarily
    /// inconsistent, so `passes` is clamped to `total`.
    pub fn summary(&self) -> RateSummary {
        let total = self.total.load(Ordering::Relaxed);
        let passes = self.passes.load(Ordering::Relaxed).min(total);
        RateSummary { passes, total }
    }
}

/// Trend samples spread over independently locked shards.
#[derive(Debug)]
pub struct ShardedTrend {
    shards: Box<[Mutex<Vec<f64>>]>,
}

impl ShardedTrend {
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(Vec::new())).collect();
        Self { shards }
    }

    pub fn record(&self, shard: usize, value: f64) {
        self.shards[shard % self.shards.len()].lock().push(value);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every shard into one vector.
    pub fn merged(&self) -> Vec<f64> {
        let mut all = Vec::with_capacity(self.len());
        for shard in self.shards.iter() {
            all.extend_from_slice(&shard.lock());
        }
        all
    }

    pub fn summary(&self) -> TrendSummary {
        TrendSummary::from_samples(self.merged())
    }
}

#[derive(Debug)]
struct RequestMetrics {
    name: String,
    duration: ShardedTrend,
    failed: RateCounter,
    reqs: Counter,
}

/// All accumulators of a run, built once from the scenario's request and
/// check names and shared between VUs.
#[derive(Debug)]
pub struct MetricsRegistry {
    shards: usize,
    http_req_duration: ShardedTrend,
    http_req_failed: RateCounter,
    http_reqs: Counter,
    checks: RateCounter,
    iteration_duration: ShardedTrend,
    iterations: Counter,
    requests: Vec<RequestMetrics>,
    check_names: Vec<String>,
    check_results: Vec<RateCounter>,
}

impl MetricsRegistry {
    /// `requests` and `checks` are indexed by position in later `record_*` calls.
    pub fn new(requests: &[String], checks: &[String], shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards,
            http_req_duration: ShardedTrend::new(shards),
            http_req_failed: RateCounter::default(),
            http_reqs: Counter::default(),
            checks: RateCounter::default(),
            iteration_duration: ShardedTrend::new(shards),
            iterations: Counter::default(),
            requests: requests
                .iter()
                .map(|name| RequestMetrics {
                    name: name.clone(),
                    duration: ShardedTrend::new(shards),
                    failed: RateCounter::default(),
                    reqs: Counter::default(),
                })
                .collect(),
            check_names: checks.to_vec(),
            check_results: checks.iter().map(|_| RateCounter::default()).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Records one request outcome. `shard` is usually the VU id.
    pub fn record_request(&self, shard: usize, request: usize, response: &ResponseSample) {
        let ms = response.duration_ms();
        let failed = response.is_failure();

        self.http_req_duration.record(shard, ms);
        self.http_req_failed.record(failed);
        self.http_reqs.add(1);

        if let Some(metrics) = self.requests.get(request) {
            metrics.duration.record(shard, ms);
            metrics.failed.record(failed);
            metrics.reqs.add(1);
        }
    }

    pub fn record_check(&self, check: usize, passed: bool) {
        self.checks.record(passed);
        if let Some(result) = self.check_results.get(check) {
            result.record(passed);
        }
    }

    pub fn record_iteration(&self, shard: usize, duration: Duration) {
        self.iteration_duration
            .record(shard, duration.as_secs_f64() * 1000.0);
        self.iterations.add(1);
    }

    pub fn requests_total(&self) -> u64 {
        self.http_reqs.get()
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations.get()
    }

    /// Merges every accumulator into an immutable summary.
    pub fn snapshot(&self, elapsed: Duration) -> RunSummary {
        let mut summary = RunSummary {
            elapsed,
            ..Default::default()
        };
        let metrics = &mut summary.metrics;

        metrics.insert(
            MetricKey::new(HTTP_REQ_DURATION),
            MetricSummary::Trend(self.http_req_duration.summary()),
        );
        metrics.insert(
            MetricKey::new(HTTP_REQ_FAILED),
            MetricSummary::Rate(self.http_req_failed.summary()),
        );
        metrics.insert(
            MetricKey::new(HTTP_REQS),
            MetricSummary::Counter(CounterSummary::new(self.http_reqs.get(), elapsed)),
        );
        metrics.insert(
            MetricKey::new(CHECKS),
            MetricSummary::Rate(self.checks.summary()),
        );
        metrics.insert(
            MetricKey::new(ITERATION_DURATION),
            MetricSummary::Trend(self.iteration_duration.summary()),
        );
        metrics.insert(
            MetricKey::new(ITERATIONS),
            MetricSummary::Counter(CounterSummary::new(self.iterations.get(), elapsed)),
        );

        for request in &self.requests {
            metrics.insert(
                MetricKey::tagged(HTTP_REQ_DURATION, &request.name),
                MetricSummary::Trend(request.duration.summary()),
            );
            metrics.insert(
                MetricKey::tagged(HTTP_REQ_FAILED, &request.name),
                MetricSummary::Rate(request.failed.summary()),
            );
            metrics.insert(
                MetricKey::tagged(HTTP_REQS, &request.name),
                MetricSummary::Counter(CounterSummary::new(request.reqs.get(), elapsed)),
            );
        }

        for (name, result) in self.check_names.iter().zip(&self.check_results) {
            let rate = result.summary();
            metrics.insert(MetricKey::tagged(CHECKS, name), MetricSummary::Rate(rate));
            summary.checks.push(CheckTally {
                name: name.clone(),
                passes: rate.passes,
                fails: rate.fails(),
            });
        }

        summary
    }
}
