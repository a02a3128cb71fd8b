use clap::{Parser, Subcommand};
use rampload_core::{parse_duration, ConfigError, RunnerSettings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

mod init;
mod inspect;
mod run;
mod telemetry;

/// Every threshold passed.
const EXIT_OK: u8 = 0;
/// At least one threshold failed.
const EXIT_THRESHOLDS_FAILED: u8 = 99;
/// Scenario or settings could not be loaded.
const EXIT_CONFIG_ERROR: u8 = 104;
/// Anything else.
const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "rampload")]
#[command(about = "Ramping HTTP load generator with threshold verdicts", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides settings
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format; overrides settings
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario and evaluate its thresholds
    Run {
        /// Scenario file (.toml or .json)
        scenario: PathBuf,

        /// Base URL for path requests, overrides the scenario and RAMPLOAD_BASE_URL
        #[arg(long)]
        base_url: Option<String>,

        /// Use the built-in simulated target instead of real HTTP
        #[arg(long)]
        dry_run: bool,

        /// Seed of the simulated target (random when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Write the JSON report to this path
        #[arg(long)]
        summary_json: Option<PathBuf>,

        /// Write the Markdown report to this path
        #[arg(long)]
        summary_md: Option<PathBuf>,
    },

    /// Validate a scenario without generating traffic
    Validate {
        /// Scenario file (.toml or .json)
        scenario: PathBuf,

        /// Base URL for path requests, overrides the scenario and RAMPLOAD_BASE_URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Print the target concurrency curve of a scenario
    Profile {
        /// Scenario file (.toml or .json)
        scenario: PathBuf,

        /// Sampling step, e.g. 10s or 1m
        #[arg(long, default_value = "10s", value_parser = parse_step)]
        step: Duration,
    },

    /// Write the sample scenario
    Init {
        /// Destination file
        #[arg(default_value = "scenario.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_step(text: &str) -> Result<Duration, String> {
    let step = parse_duration(text)?;
    if step.is_zero() {
        return Err("step must be greater than zero".to_string());
    }
    Ok(step)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let is_config = e.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some());
            eprintln!("error: {e:#}");
            ExitCode::from(if is_config {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            })
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<u8> {
    let mut settings = RunnerSettings::load()?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    telemetry::init(&settings.logging)?;

    match cli.command {
        Commands::Run {
            scenario,
            base_url,
            dry_run,
            seed,
            summary_json,
            summary_md,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let passed = runtime.block_on(run::run(
                &settings,
                run::RunArgs {
                    scenario,
                    base_url,
                    dry_run,
                    seed,
                    summary_json,
                    summary_md,
                },
            ))?;
            Ok(if passed {
                EXIT_OK
            } else {
                EXIT_THRESHOLDS_FAILED
            })
        }
        Commands::Validate { scenario, base_url } => {
            inspect::validate(&scenario, base_url)?;
            Ok(EXIT_OK)
        }
        Commands::Profile { scenario, step } => {
            inspect::profile(&scenario, step)?;
            Ok(EXIT_OK)
        }
        Commands::Init { path, force } => {
            init::write_sample(&path, force)?;
            Ok(EXIT_OK)
        }
    }
}
