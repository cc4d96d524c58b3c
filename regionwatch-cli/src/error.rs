//! CLI error types.

use thiserror::Error;

/// Errors surfaced to the CLI user.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command-line or engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Candidate file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Candidate file could not be parsed.
    #[error("Invalid candidate file: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<regionwatch::error::ConfigError> for CliError {
    fn from(e: regionwatch::error::ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}
