//! BatchedSink - EventSink front for a batch writer

use std::sync::Arc;

use batch_writer::{BatchHandler, BatchWriter, RunningWriter, WriterConfig};
use contracts::{ContractError, EventSink, KubeEvent};
use tracing::{info, instrument};

/// Sink that hands events to a [`BatchWriter`] loop
///
/// `send` submits one event and only waits while the writer is busy
/// flushing. `close` flushes what is buffered and stops the loop.
pub struct BatchedSink {
    name: String,
    writer: Option<RunningWriter<Arc<KubeEvent>>>,
}

impl BatchedSink {
    /// Start a writer around `handler`; must be called inside a tokio runtime
    pub fn start<H>(name: impl Into<String>, config: WriterConfig, handler: H) -> Self
    where
        H: BatchHandler<Arc<KubeEvent>>,
    {
        let name = name.into();
        let writer = BatchWriter::new(name.clone(), config, handler).start();
        Self {
            name,
            writer: Some(writer),
        }
    }
}

impl EventSink for BatchedSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| ContractError::sink_send(&self.name, "batch writer stopped"))?;
        writer
            .submit([Arc::clone(event)])
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))
    }

    #[instrument(name = "batched_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let stats = writer
            .stop()
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))?;
        info!(
            sink = %self.name,
            flushes = stats.flushes,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "BatchedSink closed"
        );
        Ok(())
    }
}
