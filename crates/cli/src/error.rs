//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// An input line that is not a valid event
    #[error("Malformed event on line {line}: {source}")]
    MalformedEvent {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Reading the event stream failed
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Whether the event stream can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedEvent { .. })
    }
}
