use std::path::PathBuf;
use thiserror::Error;

/// Faults that stop the runner itself, as opposed to failed requests or checks.
#[derive(Debug, Error)]
pub enum RunError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A report could not be written.
    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result alias for runner operations.
pub type RunResult<T> = Result<T, RunError>;
