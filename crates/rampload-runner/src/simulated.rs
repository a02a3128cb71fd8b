//! Seeded in-process backend for dry runs and tests.

use crate::client::HttpClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use rampload_core::ResponseSample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

/// Status returned for simulated failures.
const FAILURE_STATUS: u16 = 503;

/// Canned response for one request name.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedRoute {
    pub latency: Duration,
    pub status: u16,
    pub body: String,
}

impl SimulatedRoute {
    pub fn new(latency: Duration, status: u16) -> Self {
        Self {
            latency,
            status,
            body: "ok".to_string(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Answers requests after a configured latency without touching the network.
///
/// Routes are keyed by request name. Unknown names get the default route.
/// With a failure rate set, that share of requests returns 503; which ones
/// fail is determined by the seed.
pub struct SimulatedClient {
    routes: HashMap<String, SimulatedRoute>,
    default_route: SimulatedRoute,
    failure_rate: f64,
    /// Relative latency spread, 0.1 means +/-10%.
    jitter: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedClient {
    pub fn new(seed: u64) -> Self {
        Self {
            routes: HashMap::new(),
            default_route: SimulatedRoute::new(Duration::from_millis(10), 200),
            failure_rate: 0.0,
            jitter: 0.0,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Latency profile of the sample target service.
    pub fn sample_target(seed: u64) -> Self {
        Self::new(seed)
            .with_route("fast", SimulatedRoute::new(Duration::from_millis(5), 200))
            .with_route("slow", SimulatedRoute::new(Duration::from_millis(500), 200))
            .with_route("heavy", SimulatedRoute::new(Duration::from_millis(150), 200))
            .with_jitter(0.2)
    }

    pub fn with_route(mut self, name: impl Into<String>, route: SimulatedRoute) -> Self {
        self.routes.insert(name.into(), route);
        self
    }

    pub fn with_default_route(mut self, route: SimulatedRoute) -> Self {
        self.default_route = route;
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    fn route(&self, name: &str) -> &SimulatedRoute {
        self.routes.get(name).unwrap_or(&self.default_route)
    }

    /// Draws latency and failure for one request.
    fn roll(&self, base: Duration) -> (Duration, bool) {
        let mut rng = self.rng.lock();
        let failed = self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate);
        let latency = if self.jitter > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.jitter..=self.jitter);
            base.mul_f64(factor)
        } else {
            base
        };
        (latency, failed)
    }
}

#[async_trait]
impl HttpClient for SimulatedClient {
    async fn get(&self, name: &str, _url: &str, capture_body: bool) -> ResponseSample {
        let route = self.route(name);
        let (latency, failed) = self.roll(route.latency);

        tokio::time::sleep(latency).await;

        let status = if failed { FAILURE_STATUS } else { route.status };
        let sample = ResponseSample::ok(status, latency);
        if capture_body {
            sample.with_body(route.body.clone())
        } else {
            ResponseSample {
                body_len: route.body.len() as u64,
                ..sample
            }
        }
    }
}
