//! Routing error types

use thiserror::Error;

/// Route compilation errors
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A rule pattern is not a valid regular expression
    #[error("invalid pattern for '{field}': '{pattern}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl RoutingError {
    /// Create an invalid pattern error
    pub fn invalid_pattern(
        field: impl Into<String>,
        pattern: impl Into<String>,
        source: regex::Error,
    ) -> Self {
        Self::InvalidPattern {
            field: field.into(),
            pattern: pattern.into(),
            source,
        }
    }
}
