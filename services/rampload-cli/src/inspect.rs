//! `rampload validate` and `rampload profile`

use rampload_core::{format_duration, Scenario, Step};
use std::path::Path;
use std::time::Duration;

/// Width of the profile bar at the highest target.
const BAR_WIDTH: f64 = 40.0;

pub fn validate(path: &Path, base_url: Option<String>) -> anyhow::Result<()> {
    let scenario = crate::run::load_scenario(path, base_url)?;
    let schedule = &scenario.schedule;

    println!("✅ {} is valid", path.display());
    println!();
    println!("  name:           {}", scenario.name);
    println!("  stages:         {}", schedule.stages().len());
    println!("  total duration: {}", format_duration(schedule.total_duration()));
    println!("  max VUs:        {}", schedule.max_target());
    println!("  graceful stop:  {}", format_duration(scenario.graceful_stop));
    if let Some(iterations) = scenario.iterations {
        println!("  iterations:     {iterations}");
    }

    println!();
    println!("  steps");
    for step in &scenario.steps {
        match step {
            Step::Request(request) => {
                println!("    GET {} ({})", request.url, request.name);
                for check in &request.checks {
                    println!("      check: {}", check.check.name);
                }
            }
            Step::Pause(pause) => println!("    sleep {}", format_duration(*pause)),
        }
    }

    println!();
    if scenario.thresholds.is_empty() {
        println!("  no thresholds");
    } else {
        println!("  thresholds");
        for threshold in &scenario.thresholds {
            println!("    {}: {}", threshold.metric, threshold.expr);
        }
    }
    Ok(())
}

pub fn profile(path: &Path, step: Duration) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    let schedule = &scenario.schedule;
    let max = schedule.max_target().max(1) as f64;

    println!("{}: {}", scenario.name, schedule.description());
    println!();
    println!("{:>10}  {:>8}  {:>5}", "time", "target", "vus");
    for (t, target) in schedule.sample(step) {
        let bar = "█".repeat(((target / max) * BAR_WIDTH).round() as usize);
        println!(
            "{:>10}  {:>8.2}  {:>5}  {}",
            format_duration(t),
            target,
            schedule.vus_at(t),
            bar
        );
    }
    Ok(())
}
