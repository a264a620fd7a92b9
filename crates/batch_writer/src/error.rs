//! Batch writer error types

use thiserror::Error;

/// Batch writer errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Processing loop already terminated
    #[error("batch writer '{name}' is stopped")]
    Stopped { name: String },

    /// Processing loop panicked (handler panic)
    #[error("batch writer '{name}' loop panicked: {message}")]
    LoopPanicked { name: String, message: String },
}

impl BatchError {
    /// Create a stopped error
    pub fn stopped(name: impl Into<String>) -> Self {
        Self::Stopped { name: name.into() }
    }
}
