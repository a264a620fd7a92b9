//! Receiver registry - name to queue mapping used by the route tree
//!
//! Two phases: receivers are registered on a [`RegistryBuilder`], which is
//! then frozen into a [`ChannelRegistry`]. The frozen map is read-only, so
//! dispatch needs no locking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{EventSink, KubeEvent, ReceiverRegistry};
pub use contracts::DEFAULT_QUEUE_CAPACITY;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::ReceiverHandle;
use crate::metrics::MetricsSnapshot;

/// Collects receivers before dispatch starts
#[derive(Default)]
pub struct RegistryBuilder {
    handles: Vec<ReceiverHandle>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a worker for `sink` under `name`
    ///
    /// Must be called inside a tokio runtime. A second registration under an
    /// existing name is rejected and the sink is dropped unstarted.
    #[instrument(name = "registry_register", skip(self, sink), fields(receiver = %name))]
    pub fn register<S: EventSink + Send + 'static>(
        &mut self,
        name: &str,
        sink: S,
        queue_capacity: usize,
    ) -> Result<&mut Self, DispatcherError> {
        if self.contains(name) {
            return Err(DispatcherError::duplicate_receiver(name));
        }

        self.handles
            .push(ReceiverHandle::spawn_named(name, sink, queue_capacity));
        debug!(receiver = %name, queue_capacity, "Receiver registered");
        Ok(self)
    }

    /// Whether `name` is already registered
    pub fn contains(&self, name: &str) -> bool {
        self.handles.iter().any(|h| h.name() == name)
    }

    /// Number of registered receivers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Freeze the receiver set
    pub fn build(self) -> ChannelRegistry {
        let order = self.handles.iter().map(|h| h.name().to_string()).collect();
        let handles = self
            .handles
            .into_iter()
            .map(|h| (h.name().to_string(), h))
            .collect();

        ChannelRegistry {
            handles,
            order,
            unknown_receiver: AtomicU64::new(0),
        }
    }
}

/// Frozen registry with one bounded queue per receiver
pub struct ChannelRegistry {
    handles: HashMap<String, ReceiverHandle>,
    /// Registration order, for stable reporting and shutdown
    order: Vec<String>,
    unknown_receiver: AtomicU64,
}

impl ChannelRegistry {
    /// Registered receiver names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Metrics for one receiver
    pub fn receiver_metrics(&self, name: &str) -> Option<MetricsSnapshot> {
        self.handles.get(name).map(|h| h.metrics().snapshot())
    }

    /// Metrics for every receiver, in registration order
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.handles
                    .get(name)
                    .map(|h| (name.clone(), h.metrics().snapshot()))
            })
            .collect()
    }

    /// Events addressed to names that were never registered
    pub fn unknown_receiver_count(&self) -> u64 {
        self.unknown_receiver.load(Ordering::Relaxed)
    }

    /// Drain every queue and close every sink
    ///
    /// Events already accepted are delivered before each sink's `close`.
    /// Returns the final metrics, in registration order.
    #[instrument(name = "registry_close", skip(self), fields(receivers = self.order.len()))]
    pub async fn close(mut self) -> Vec<(String, MetricsSnapshot)> {
        let mut report = Vec::with_capacity(self.order.len());
        for name in &self.order {
            if let Some(handle) = self.handles.remove(name) {
                report.push((name.clone(), handle.shutdown().await));
            }
        }
        info!(
            unknown_receiver = self.unknown_receiver_count(),
            "All receivers closed"
        );
        report
    }
}

impl ReceiverRegistry for ChannelRegistry {
    fn send_event(&self, name: &str, event: &Arc<KubeEvent>) {
        match self.handles.get(name) {
            Some(handle) => {
                if handle.try_send(event) {
                    counter!("event_exporter_events_dispatched_total", "receiver" => name.to_string())
                        .increment(1);
                }
            }
            None => {
                self.unknown_receiver.fetch_add(1, Ordering::Relaxed);
                counter!("event_exporter_unknown_receiver_total", "receiver" => name.to_string())
                    .increment(1);
                warn!(receiver = %name, uid = %event.uid(), "Event sent to unknown receiver");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::InMemorySink;
    use contracts::ContractError;
    use std::time::Instant;
    use tokio::time::{sleep, Duration};

    /// Sink that takes `delay` per event and counts closes
    struct SlowSink {
        delay: Duration,
        sent: Arc<AtomicU64>,
        closed: Arc<AtomicU64>,
    }

    impl EventSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn send(&mut self, _event: &Arc<KubeEvent>) -> Result<(), ContractError> {
            sleep(self.delay).await;
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event(uid: &str) -> Arc<KubeEvent> {
        let mut ev = KubeEvent::default();
        ev.metadata.uid = uid.to_string();
        Arc::new(ev)
    }

    #[tokio::test]
    async fn test_duplicate_register_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register("a", InMemorySink::new("a"), 10).unwrap();

        let err = builder
            .register("a", InMemorySink::new("a"), 10)
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::DuplicateReceiver { ref name } if name == "a"));
        assert_eq!(builder.len(), 1);

        builder.build().close().await;
    }

    #[tokio::test]
    async fn test_send_delivers_in_order() {
        let sink = InMemorySink::new("mem");
        let events = sink.events();

        let mut builder = RegistryBuilder::new();
        builder.register("mem", sink, 10).unwrap();
        let registry = builder.build();

        let sent: Vec<_> = (0..5).map(|i| event(&i.to_string())).collect();
        for ev in &sent {
            registry.send_event("mem", ev);
        }
        registry.close().await;

        let received = events.snapshot();
        assert_eq!(received.len(), 5);
        for (got, want) in received.iter().zip(&sent) {
            assert!(Arc::ptr_eq(got, want));
        }
    }

    #[tokio::test]
    async fn test_unknown_receiver_is_absorbed() {
        let registry = RegistryBuilder::new().build();
        registry.send_event("missing", &event("x"));
        registry.send_event("missing", &event("y"));

        assert_eq!(registry.unknown_receiver_count(), 2);
        registry.close().await;
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_block_send() {
        let sent = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(AtomicU64::new(0));
        let sink = SlowSink {
            delay: Duration::from_millis(200),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };

        let mut builder = RegistryBuilder::new();
        builder.register("slow", sink, DEFAULT_QUEUE_CAPACITY).unwrap();
        let registry = builder.build();

        let start = Instant::now();
        for i in 0..3 {
            registry.send_event("slow", &event(&i.to_string()));
        }
        assert!(start.elapsed() < Duration::from_millis(100));

        // close waits for every accepted event, then closes exactly once
        registry.close().await;
        assert_eq!(sent.load(Ordering::SeqCst), 3);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_counts() {
        let sink = SlowSink {
            delay: Duration::from_millis(50),
            sent: Arc::default(),
            closed: Arc::default(),
        };
        let sent = Arc::clone(&sink.sent);

        let mut builder = RegistryBuilder::new();
        builder.register("slow", sink, 1).unwrap();
        let registry = builder.build();

        for i in 0..5 {
            registry.send_event("slow", &event(&i.to_string()));
        }

        let snapshot = registry.receiver_metrics("slow").unwrap();
        assert!(snapshot.dropped_count >= 3);

        registry.close().await;
        assert_eq!(sent.load(Ordering::SeqCst), 5 - snapshot.dropped_count);
    }

    #[tokio::test]
    async fn test_metrics_in_registration_order() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("b", InMemorySink::new("b"), 10)
            .unwrap()
            .register("a", InMemorySink::new("a"), 10)
            .unwrap();
        let registry = builder.build();

        registry.send_event("a", &event("1"));
        registry.send_event("a", &event("2"));
        registry.send_event("b", &event("3"));

        let names: Vec<_> = registry.names().map(str::to_string).collect();
        assert_eq!(names, vec!["b", "a"]);

        // Give the workers a moment to drain
        sleep(Duration::from_millis(50)).await;
        let metrics = registry.metrics();
        assert_eq!(metrics[0].0, "b");
        assert_eq!(metrics[0].1.sent_count, 1);
        assert_eq!(metrics[1].1.sent_count, 2);

        registry.close().await;
    }
}
