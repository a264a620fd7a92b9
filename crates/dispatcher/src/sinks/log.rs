//! LogSink - logs an event summary via tracing

use std::sync::Arc;

use contracts::{ContractError, EventSink, KubeEvent};
use tracing::{debug, info, instrument};

/// Sink that logs event summaries, for debugging routes
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid())
    )]
    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            namespace = %event.namespace(),
            kind = %event.involved_object.kind,
            object = %event.involved_object.name,
            reason = %event.reason,
            event_type = %event.event_type,
            count = event.count,
            event_message = %event.message,
            "KubeEvent received"
        );
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
