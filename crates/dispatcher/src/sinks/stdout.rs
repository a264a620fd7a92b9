//! StdoutSink - one JSON line per event on standard output

use std::io::{self, Write};
use std::sync::Arc;

use contracts::{ContractError, EventSink, KubeEvent};
use tracing::{debug, instrument};

/// Sink that prints events as JSON lines
pub struct StdoutSink {
    name: String,
    dedot: bool,
}

impl StdoutSink {
    pub fn new(name: impl Into<String>, dedot: bool) -> Self {
        Self {
            name: name.into(),
            dedot,
        }
    }
}

impl EventSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "stdout_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid())
    )]
    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        let mut line = if self.dedot {
            event.dedot().to_json()?
        } else {
            event.to_json()?
        };
        line.push(b'\n');

        io::stdout()
            .lock()
            .write_all(&line)
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))
    }

    #[instrument(name = "stdout_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        io::stdout().flush()?;
        debug!(sink = %self.name, "StdoutSink closed");
        Ok(())
    }
}
