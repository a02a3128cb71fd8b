use std::path::PathBuf;
use thiserror::Error;

/// Canonical error type for configuration loading and validation.
///
/// Every variant is raised before any traffic is generated.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A ramp stage is malformed.
    #[error("stage {index}: {message}")]
    InvalidStage {
        /// Zero-based position of the stage in the schedule.
        index: usize,
        /// Human-readable explanation.
        message: String,
    },

    /// A threshold expression could not be parsed or does not fit its metric.
    #[error("threshold `{metric}: {expression}`: {message}")]
    InvalidThreshold {
        /// Metric key the threshold is attached to.
        metric: String,
        /// Expression source text.
        expression: String,
        /// Human-readable explanation.
        message: String,
    },

    /// A check definition is malformed.
    #[error("check `{name}`: {message}")]
    InvalidCheck {
        /// Check name as written in the scenario.
        name: String,
        /// Human-readable explanation.
        message: String,
    },

    /// The scenario step list is malformed.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    /// Runner settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },

    /// Layered settings could not be built.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ConfigError {
    /// Creates an `InvalidStage` variant.
    #[must_use]
    pub fn invalid_stage(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidStage {
            index,
            message: message.into(),
        }
    }

    /// Creates an `InvalidThreshold` variant.
    #[must_use]
    pub fn invalid_threshold(
        metric: impl Into<String>,
        expression: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidThreshold {
            metric: metric.into(),
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidCheck` variant.
    #[must_use]
    pub fn invalid_check(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCheck {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Convenient result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
