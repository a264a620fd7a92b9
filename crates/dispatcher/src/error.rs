//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Receiver registered twice
    #[error("receiver '{name}' is already registered")]
    DuplicateReceiver { name: String },

    /// Route tree failed to compile
    #[error("routing error: {0}")]
    Routing(#[from] routing::RoutingError),

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate receiver error
    pub fn duplicate_receiver(name: impl Into<String>) -> Self {
        Self::DuplicateReceiver { name: name.into() }
    }
}
