//! `rampload run`

use anyhow::Context;
use rampload_core::{RunnerSettings, Scenario, ScenarioFile};
use rampload_runner::{
    HttpClient, LoadDriver, ReportFormat, ReqwestClient, ResultWriter, SimulatedClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RunArgs {
    pub scenario: PathBuf,
    pub base_url: Option<String>,
    pub dry_run: bool,
    pub seed: Option<u64>,
    pub summary_json: Option<PathBuf>,
    pub summary_md: Option<PathBuf>,
}

/// Loads a scenario with the base URL resolved: `base_url` first, then
/// `RAMPLOAD_BASE_URL`, then the file.
pub fn load_scenario(path: &Path, base_url: Option<String>) -> anyhow::Result<Scenario> {
    let mut file = ScenarioFile::from_path(path)?;
    file.apply_env_overrides();
    if let Some(base_url) = base_url {
        file.base_url = Some(base_url);
    }
    Ok(Scenario::from_file(&file)?)
}

/// Runs the scenario, prints the summary and writes the requested reports.
/// Returns whether every threshold passed.
pub async fn run(settings: &RunnerSettings, args: RunArgs) -> anyhow::Result<bool> {
    let scenario = load_scenario(&args.scenario, args.base_url)?;

    let client: Arc<dyn HttpClient> = if args.dry_run {
        let seed = args.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, "Dry run against the simulated target");
        Arc::new(SimulatedClient::sample_target(seed))
    } else {
        Arc::new(ReqwestClient::new(&settings.http).context("failed to create HTTP client")?)
    };

    let driver = LoadDriver::new(scenario, client, settings.driver.clone());
    let outcome = driver.run().await;

    let writer = ResultWriter::new(&outcome);
    println!("{}", writer.render(ReportFormat::Text)?);

    if let Some(path) = &args.summary_json {
        writer.write_report(path, ReportFormat::Json)?;
    }
    if let Some(path) = &args.summary_md {
        writer.write_report(path, ReportFormat::Markdown)?;
    }

    if !writer.passes() {
        tracing::warn!("Thresholds failed:\n{}", writer.failure_summary());
    }
    Ok(writer.passes())
}
