//! Load profile driver: keeps the active VU count on the stage curve

use crate::client::HttpClient;
use crate::reporter::RunOutcome;
use crate::vu::{ControlState, IterationBudget, VirtualUser};
use chrono::Utc;
use futures::future::join_all;
use rampload_core::config::DriverSettings;
use rampload_core::metrics::HTTP_REQ_DURATION;
use rampload_core::{evaluate_all, format_duration, MetricsRegistry, Scenario, StageSchedule};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Drives a scenario through its stages
pub struct LoadDriver {
    scenario: Arc<Scenario>,
    client: Arc<dyn HttpClient>,
    settings: DriverSettings,
}

impl LoadDriver {
    /// Create new driver
    pub fn new(scenario: Scenario, client: Arc<dyn HttpClient>, settings: DriverSettings) -> Self {
        Self {
            scenario: Arc::new(scenario),
            client,
            settings,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn schedule(&self) -> &StageSchedule {
        &self.scenario.schedule
    }

    /// Runs the scenario to completion and evaluates its thresholds.
    ///
    /// Failed requests, checks and thresholds never abort the run; they only
    /// show up in the returned outcome.
    pub async fn run(&self) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let schedule = self.schedule();
        let max_vus = schedule.max_target() as usize;

        tracing::info!(
            %run_id,
            scenario = %self.scenario.name,
            schedule = %schedule.description(),
            thresholds = self.scenario.thresholds.len(),
            iterations = ?self.scenario.iterations,
            "🚀 Starting load test"
        );

        let shards = max_vus.clamp(1, self.settings.max_shards.max(1));
        let metrics = Arc::new(MetricsRegistry::new(
            &self.scenario.request_names(),
            &self.scenario.check_names(),
            shards,
        ));
        let budget = self
            .scenario
            .iterations
            .map(|limit| Arc::new(IterationBudget::new(limit)));

        let start = Instant::now();
        let (control, receiver) = watch::channel(ControlState::running(schedule.vus_at(Duration::ZERO)));

        let mut handles: Vec<JoinHandle<u64>> = (0..max_vus)
            .map(|id| {
                let vu = VirtualUser::new(
                    id,
                    Arc::clone(&self.scenario),
                    Arc::clone(&self.client),
                    Arc::clone(&metrics),
                );
                tokio::spawn(vu.run(start, receiver.clone(), budget.clone()))
            })
            .collect();
        drop(receiver);

        self.follow_schedule(start, &control, &metrics, budget.as_deref())
            .await;

        let interrupted_iterations = self.wind_down(&control, &mut handles).await;

        let elapsed = start.elapsed();
        let summary = metrics.snapshot(elapsed);
        let verdicts = evaluate_all(&self.scenario.thresholds, &summary);
        let passed = verdicts.iter().all(|v| v.passed);

        for verdict in &verdicts {
            if verdict.passed {
                tracing::info!(
                    metric = %verdict.metric,
                    expression = %verdict.expression,
                    observed = verdict.observed,
                    "Threshold passed"
                );
            } else {
                tracing::warn!(
                    metric = %verdict.metric,
                    expression = %verdict.expression,
                    observed = verdict.observed,
                    "Threshold failed"
                );
            }
        }

        tracing::info!(
            %run_id,
            elapsed = %format_duration(Duration::from_millis(elapsed.as_millis() as u64)),
            requests = summary.request_count(),
            iterations = metrics.iterations_total(),
            interrupted_iterations,
            error_rate = summary.error_rate(),
            passed,
            "✅ Load test complete"
        );

        RunOutcome {
            run_id,
            scenario: self.scenario.name.clone(),
            started_at,
            summary,
            verdicts,
            interrupted_iterations,
            passed,
        }
    }

    /// Publishes the curve every tick until the last stage ends or the
    /// iteration budget has been handed out. The end of the schedule is
    /// observed exactly, not on the next tick.
    async fn follow_schedule(
        &self,
        start: Instant,
        control: &watch::Sender<ControlState>,
        metrics: &MetricsRegistry,
        budget: Option<&IterationBudget>,
    ) {
        let schedule = self.schedule();
        let total = schedule.total_duration();

        let mut ticker = interval(self.settings.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let report_interval = self.settings.report_interval();
        let mut last_report = Duration::ZERO;
        let mut current_stage = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::time::sleep(total.saturating_sub(start.elapsed())) => {}
            }
            let elapsed = start.elapsed();

            if elapsed >= total {
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Schedule complete");
                break;
            }
            if budget.map_or(false, IterationBudget::is_exhausted) {
                tracing::info!("Iteration budget consumed");
                break;
            }

            let stage = schedule.stage_index_at(elapsed);
            if stage != current_stage {
                current_stage = stage;
                if let Some(index) = stage {
                    tracing::debug!(
                        stage = index + 1,
                        target = schedule.stages()[index].target,
                        "Entering stage"
                    );
                }
            }

            let active = schedule.vus_at(elapsed);
            control.send_if_modified(|state| {
                if state.active == active {
                    return false;
                }
                state.active = active;
                true
            });

            if elapsed - last_report >= report_interval {
                last_report = elapsed;
                self.report_progress(metrics, elapsed, active);
            }
        }
    }

    /// Logs a progress line and any threshold that currently fails.
    fn report_progress(&self, metrics: &MetricsRegistry, elapsed: Duration, active: u64) {
        let snapshot = metrics.snapshot(elapsed);
        let p95 = snapshot
            .trend(HTTP_REQ_DURATION)
            .map(|t| t.p95)
            .unwrap_or(0.0);

        tracing::info!(
            elapsed_secs = elapsed.as_secs(),
            active_vus = active,
            requests = snapshot.request_count(),
            p95_ms = p95,
            error_rate = snapshot.error_rate(),
            "Progress"
        );

        for verdict in evaluate_all(&self.scenario.thresholds, &snapshot) {
            if !verdict.passed {
                tracing::warn!(
                    metric = %verdict.metric,
                    expression = %verdict.expression,
                    observed = verdict.observed,
                    "Threshold currently failing"
                );
            }
        }
    }

    /// Stops new iterations and waits up to `graceful_stop` for the running
    /// ones. Returns how many iterations had to be aborted.
    async fn wind_down(
        &self,
        control: &watch::Sender<ControlState>,
        handles: &mut [JoinHandle<u64>],
    ) -> u64 {
        control.send_replace(ControlState::stopping());

        let graceful_stop = self.scenario.graceful_stop;
        let finished = tokio::time::timeout(graceful_stop, join_all(handles.iter_mut())).await;

        match finished {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "VU task failed");
                    }
                }
                0
            }
            Err(_) => {
                let mut interrupted = 0;
                for handle in handles.iter() {
                    if !handle.is_finished() {
                        handle.abort();
                        interrupted += 1;
                    }
                }
                tracing::warn!(
                    interrupted,
                    graceful_stop = %format_duration(graceful_stop),
                    "Graceful stop expired, aborted running iterations"
                );
                interrupted
            }
        }
    }
}
