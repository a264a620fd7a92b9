//! EventSink trait - delivery capability behind every receiver
//!
//! Defines the abstract interface for sinks.

use std::sync::Arc;

use crate::{ContractError, KubeEvent};

/// Event output trait
///
/// All sink implementations must implement this trait. Idempotency and
/// retries are the sink's own concern; the registry only logs failures.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one event
    ///
    /// The event is shared with other receivers; sinks that need to keep it
    /// past the call clone the `Arc`, never the event.
    ///
    /// # Errors
    /// Returns send error (should include context)
    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError>;

    /// Flush and release resources
    ///
    /// Called exactly once, after the last `send` for this sink has returned.
    async fn close(&mut self) -> Result<(), ContractError>;
}
