//! Load driver scenarios on a paused clock
//!
//! 1. Single VU, single iteration: exact iteration time and check results
//! 2. Ramp-down while iterations are in flight
//! 3. Full sample scenario against the simulated target

use rampload_core::metrics::{CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION};
use rampload_core::{MetricKey, MetricSummary, RunnerSettings, Scenario, ScenarioFile, Stage, StageSchedule, TrendSummary};
use rampload_runner::{LoadDriver, SimulatedClient, SimulatedRoute};
use std::sync::Arc;
use std::time::Duration;

fn three_endpoint_backend() -> SimulatedClient {
    SimulatedClient::new(11)
        .with_route("fast", SimulatedRoute::new(Duration::from_millis(50), 200))
        .with_route("slow", SimulatedRoute::new(Duration::from_millis(300), 200))
        .with_route("heavy", SimulatedRoute::new(Duration::from_millis(900), 200))
}

fn sample_with(overrides: &str) -> Scenario {
    let toml = format!("{overrides}\n{}", rampload_core::SAMPLE_SCENARIO);
    Scenario::from_file(&ScenarioFile::from_toml_str(&toml).unwrap()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_single_iteration_elapses_pauses_plus_latency() {
    // Setup: the sample steps, one VU, one iteration
    let mut scenario = sample_with("iterations = 1");
    scenario.schedule = StageSchedule::new(1, vec![Stage::new(Duration::from_secs(60), 1)]).unwrap();

    let driver = LoadDriver::new(
        scenario,
        Arc::new(three_endpoint_backend()),
        RunnerSettings::default().driver,
    );

    // Action
    let outcome = driver.run().await;

    // Validation: 3 x 1s pauses + 1250ms of latency, all six checks pass
    let summary = &outcome.summary;
    assert_eq!(summary.counter(ITERATIONS).unwrap().count, 1);
    assert_eq!(summary.trend(ITERATION_DURATION).unwrap().max, 4250.0);
    assert_eq!(outcome.elapsed(), Duration::from_millis(4250));

    let checks = summary.rate(CHECKS).unwrap();
    assert_eq!((checks.passes, checks.total), (6, 6));
    assert!(summary.checks.iter().all(|c| c.passes == 1 && c.fails == 0));

    let fast = summary
        .get(&MetricKey::tagged(HTTP_REQ_DURATION, "fast"))
        .unwrap();
    assert_eq!(
        fast,
        &MetricSummary::Trend(TrendSummary::from_samples(vec![50.0]))
    );
    assert_eq!(outcome.interrupted_iterations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ramp_down_does_not_interrupt_iterations() {
    // Setup: two VUs ramped to zero while both are inside a 5s request
    let scenario = Scenario::from_file(
        &ScenarioFile::from_toml_str(
            r#"
start_vus = 2
base_url = "http://sim"

[[stages]]
duration = "2s"
target = 2

[[stages]]
duration = "1s"
target = 0

[[scenario.steps]]
request = { name = "long", path = "/long" }
checks = [{ name = "long status 200", status = 200 }]
"#,
        )
        .unwrap(),
    )
    .unwrap();
    let client = SimulatedClient::new(5)
        .with_route("long", SimulatedRoute::new(Duration::from_secs(5), 200));

    // Action
    let outcome = LoadDriver::new(scenario, Arc::new(client), RunnerSettings::default().driver)
        .run()
        .await;

    // Validation: both iterations ran to completion
    let summary = &outcome.summary;
    assert_eq!(summary.counter(ITERATIONS).unwrap().count, 2);
    assert_eq!(summary.request_count(), 2);
    assert_eq!(summary.trend(ITERATION_DURATION).unwrap().min, 5000.0);
    assert_eq!(summary.rate(CHECKS).unwrap().passes, 2);
    assert_eq!(outcome.interrupted_iterations, 0);
    assert_eq!(outcome.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_sample_scenario_against_simulated_target() {
    // Setup: the shipped sample scenario, unchanged
    let scenario = sample_with("");
    assert_eq!(scenario.schedule.total_duration(), Duration::from_secs(210));

    // Action
    let outcome = LoadDriver::new(
        scenario,
        Arc::new(SimulatedClient::sample_target(42)),
        RunnerSettings::default().driver,
    )
    .run()
    .await;

    // Validation: a third of all requests hit the ~500ms endpoint, so the
    // p(95)<500 latency threshold fails while the error-rate threshold holds
    let summary = &outcome.summary;
    assert!(summary.request_count() > 1000);
    assert_eq!(summary.request_count() % 3, 0);
    assert_eq!(summary.error_rate(), 0.0);
    assert_eq!(outcome.interrupted_iterations, 0);

    let latency = outcome
        .verdicts
        .iter()
        .find(|v| v.metric == MetricKey::new(HTTP_REQ_DURATION))
        .unwrap();
    assert!(!latency.passed);
    assert!(latency.observed > 500.0);

    let failed = outcome
        .verdicts
        .iter()
        .find(|v| v.metric == MetricKey::new(HTTP_REQ_FAILED))
        .unwrap();
    assert!(failed.passed);
    assert!(!outcome.passed);

    // iterations started before t=210s are allowed to finish
    assert!(outcome.elapsed() >= Duration::from_secs(210));
    assert!(outcome.elapsed() < Duration::from_secs(215));
}
