//! ReceiverHandle - one sink behind an isolated queue and worker task

use std::sync::Arc;

use contracts::{EventSink, KubeEvent};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::{MetricsSnapshot, SinkMetrics};

/// Handle to a running receiver worker
pub struct ReceiverHandle {
    /// Receiver name
    name: String,
    /// Queue feeding the worker
    tx: mpsc::Sender<Arc<KubeEvent>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl ReceiverHandle {
    /// Spawn the worker task for `sink` behind a queue of `queue_capacity`
    ///
    /// The handle takes the receiver name from the sink.
    pub fn spawn<S: EventSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        Self::spawn_named(name, sink, queue_capacity)
    }

    /// Like [`ReceiverHandle::spawn`] but registered under `name`
    pub fn spawn_named<S: EventSink + Send + 'static>(
        name: impl Into<String>,
        sink: S,
        queue_capacity: usize,
    ) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            receiver_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Receiver name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Enqueue an event without waiting
    ///
    /// Returns false if the queue is full (event dropped) or the worker is gone.
    pub fn try_send(&self, event: &Arc<KubeEvent>) -> bool {
        match self.tx.try_send(Arc::clone(event)) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(ev)) => {
                self.metrics.inc_dropped_count();
                counter!("event_exporter_events_dropped_total", "receiver" => self.name.clone())
                    .increment(1);
                warn!(
                    receiver = %self.name,
                    uid = %ev.uid(),
                    "Queue full, event dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(receiver = %self.name, "Receiver worker closed unexpectedly");
                false
            }
        }
    }

    /// Stop accepting events, drain the queue and close the sink
    ///
    /// Returns the final metrics.
    #[instrument(name = "receiver_handle_shutdown", skip(self), fields(receiver = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        // Worker sees end-of-queue once the last sender is gone
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(receiver = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(receiver = %self.name, "ReceiverHandle shutdown complete");
        self.metrics.snapshot()
    }
}

/// Worker task that feeds queued events to the sink
#[instrument(
    name = "receiver_worker_loop",
    skip(sink, rx, metrics),
    fields(receiver = %name)
)]
async fn receiver_worker<S: EventSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<KubeEvent>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(receiver = %name, "Receiver worker started");

    while let Some(event) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.send(&event).await {
            Ok(()) => {
                metrics.inc_sent_count();
                counter!(
                    "event_exporter_events_sent_total",
                    "receiver" => name.clone(),
                    "status" => "success"
                )
                .increment(1);
            }
            Err(e) => {
                metrics.inc_failure_count();
                counter!(
                    "event_exporter_events_sent_total",
                    "receiver" => name.clone(),
                    "status" => "failure"
                )
                .increment(1);
                // One bad event must not stop the receiver
                error!(
                    receiver = %name,
                    uid = %event.uid(),
                    error = %e,
                    "Send failed"
                );
            }
        }
    }

    if let Err(e) = sink.close().await {
        error!(receiver = %name, error = %e, "Close failed on shutdown");
    }

    debug!(receiver = %name, "Receiver worker stopped");
}
