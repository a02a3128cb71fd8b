//! Virtual users: one task each, looping over the scenario steps.

use crate::client::HttpClient;
use rampload_core::scenario::{RequestStep, Scenario, Step};
use rampload_core::MetricsRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// What the driver currently wants from the VU pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    /// VUs with an id below this value run iterations, the others park.
    pub active: u64,
    /// Set once at the end of the run; no new iteration may start.
    pub stopping: bool,
}

impl ControlState {
    pub fn running(active: u64) -> Self {
        Self {
            active,
            stopping: false,
        }
    }

    pub fn stopping() -> Self {
        Self {
            active: 0,
            stopping: true,
        }
    }
}

/// Total number of iterations that may be started, shared by all VUs.
#[derive(Debug)]
pub struct IterationBudget {
    limit: u64,
    started: AtomicU64,
}

impl IterationBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            started: AtomicU64::new(0),
        }
    }

    /// Claims one iteration, false once the budget is used up.
    pub fn try_acquire(&self) -> bool {
        self.started.fetch_add(1, Ordering::Relaxed) < self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.started.load(Ordering::Relaxed) >= self.limit
    }
}

/// A single simulated client.
pub struct VirtualUser {
    id: usize,
    scenario: Arc<Scenario>,
    client: Arc<dyn HttpClient>,
    metrics: Arc<MetricsRegistry>,
}

impl VirtualUser {
    pub fn new(
        id: usize,
        scenario: Arc<Scenario>,
        client: Arc<dyn HttpClient>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            id,
            scenario,
            client,
            metrics,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs iterations while the driver keeps this VU active.
    ///
    /// Activation is only re-checked between iterations, so a ramp-down
    /// never cuts an iteration short. No iteration starts once the schedule,
    /// counted from `origin`, has ended. Returns the number of iterations run.
    pub async fn run(
        self,
        origin: Instant,
        mut control: watch::Receiver<ControlState>,
        budget: Option<Arc<IterationBudget>>,
    ) -> u64 {
        let total = self.scenario.schedule.total_duration();
        let mut completed = 0;

        loop {
            let state = *control.borrow_and_update();
            if state.stopping {
                break;
            }

            if self.id as u64 >= state.active {
                // parked until the target changes
                if control.changed().await.is_err() {
                    break;
                }
                continue;
            }

            if origin.elapsed() >= total {
                break;
            }

            if let Some(budget) = &budget {
                if !budget.try_acquire() {
                    break;
                }
            }

            self.run_iteration().await;
            completed += 1;
        }

        tracing::trace!(vu = self.id, iterations = completed, "VU finished");
        completed
    }

    /// Executes every step once and records the iteration duration.
    pub async fn run_iteration(&self) -> Duration {
        let start = Instant::now();

        for step in &self.scenario.steps {
            match step {
                Step::Request(request) => self.execute_request(request).await,
                Step::Pause(pause) => tokio::time::sleep(*pause).await,
            }
        }

        let elapsed = start.elapsed();
        self.metrics.record_iteration(self.id, elapsed);
        elapsed
    }

    async fn execute_request(&self, request: &RequestStep) {
        let response = self
            .client
            .get(&request.name, &request.url, request.needs_body())
            .await;
        self.metrics.record_request(self.id, request.id, &response);

        for check in &request.checks {
            let passed = check.check.evaluate(&response);
            self.metrics.record_check(check.id, passed);
            if !passed {
                tracing::trace!(
                    vu = self.id,
                    request = %request.name,
                    check = %check.check.name,
                    status = response.status,
                    "Check failed"
                );
            }
        }
    }
}
