//! Runner settings
//!
//! Settings that are independent of any scenario (HTTP client, driver cadence,
//! logging). Sources, from lowest to highest precedence:
//! 1. Hardcoded defaults
//! 2. `./rampload.toml`
//! 3. File named by `RAMPLOAD_CONFIG`
//! 4. Environment variables, e.g. `RAMPLOAD__HTTP__TIMEOUT_MS=5000`

use crate::error::{ConfigError, ConfigResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RunnerSettings {
    pub http: HttpSettings,
    pub driver: DriverSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DriverSettings {
    /// How often the driver re-reads the stage curve.
    pub tick_interval_ms: u64,
    /// How often progress is logged and thresholds are evaluated mid-run.
    pub report_interval_secs: u64,
    /// Upper bound on trend shards.
    pub max_shards: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, error
    pub level: String,
    /// pretty or json
    pub format: String,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DriverSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            http: HttpSettings {
                timeout_ms: 60_000,
                user_agent: default_user_agent(),
            },
            driver: DriverSettings {
                tick_interval_ms: 100,
                report_interval_secs: 10,
                max_shards: 64,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

fn default_user_agent() -> String {
    format!("rampload/{}", env!("CARGO_PKG_VERSION"))
}

impl RunnerSettings {
    /// Loads settings from defaults, optional files and the environment.
    pub fn load() -> ConfigResult<Self> {
        let mut builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name("./rampload").required(false));

        if let Ok(path) = std::env::var("RAMPLOAD_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RAMPLOAD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: RunnerSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from one file on top of the defaults, ignoring the environment.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let settings: RunnerSettings = Self::with_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let defaults = Self::default();
        builder
            .set_default("http.timeout_ms", defaults.http.timeout_ms)?
            .set_default("http.user_agent", defaults.http.user_agent)?
            .set_default("driver.tick_interval_ms", defaults.driver.tick_interval_ms)?
            .set_default(
                "driver.report_interval_secs",
                defaults.driver.report_interval_secs,
            )?
            .set_default("driver.max_shards", defaults.driver.max_shards as u64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::InvalidSettings(
                "http.timeout_ms must be > 0".to_string(),
            ));
        }

        if self.driver.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidSettings(
                "driver.tick_interval_ms must be > 0".to_string(),
            ));
        }

        if self.driver.report_interval_secs == 0 {
            return Err(ConfigError::InvalidSettings(
                "driver.report_interval_secs must be > 0".to_string(),
            ));
        }

        if self.driver.max_shards == 0 {
            return Err(ConfigError::InvalidSettings(
                "driver.max_shards must be > 0".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidSettings(format!(
                "logging.format must be `pretty` or `json`, got `{}`",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = RunnerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.http.timeout(), Duration::from_secs(60));
        assert_eq!(settings.driver.tick_interval(), Duration::from_millis(100));
        assert!(settings.http.user_agent.starts_with("rampload/"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[http]\ntimeout_ms = 5000\n\n[logging]\nformat = \"json\"").unwrap();

        let settings = RunnerSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.http.timeout_ms, 5000);
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.driver.max_shards, 64);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = RunnerSettings::default();
        settings.driver.tick_interval_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = RunnerSettings::default();
        settings.logging.format = "xml".to_string();
        assert!(settings.validate().is_err());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[driver]\nmax_shards = 0").unwrap();
        let err = RunnerSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings(_)));
    }
}
