//! Engine - route tree plus receiver registry, wired from configuration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use batch_writer::WriterConfig;
use contracts::{BatchSettings, ExporterConfig, KubeEvent, ReceiverConfig, SinkType};
use metrics::counter;
use routing::Route;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::registry::{ChannelRegistry, RegistryBuilder};
use crate::sinks::{
    parse_dedot, BatchedSink, FileBatchHandler, FileSink, LogSink, StdoutSink, UdpSink,
};

/// Routes incoming events to their receivers
pub struct Engine {
    route: Route,
    registry: ChannelRegistry,
    cluster_name: String,
    received: AtomicU64,
}

impl Engine {
    /// Assemble an engine from already built parts
    pub fn new(route: Route, registry: ChannelRegistry, cluster_name: impl Into<String>) -> Self {
        Self {
            route,
            registry,
            cluster_name: cluster_name.into(),
            received: AtomicU64::new(0),
        }
    }

    /// Compile the route, start every receiver and freeze the registry
    ///
    /// Must be called inside a tokio runtime. Receivers started before a
    /// failure are closed again before the error is returned.
    #[instrument(
        name = "engine_from_config",
        skip(config),
        fields(receivers = config.receivers.len())
    )]
    pub async fn from_config(config: &ExporterConfig) -> Result<Self, DispatcherError> {
        let route = Route::compile(&config.route)?;

        let mut builder = RegistryBuilder::new();
        for receiver in &config.receivers {
            if let Err(e) = register_receiver(&mut builder, receiver).await {
                builder.build().close().await;
                return Err(e);
            }
        }

        info!(
            receivers = builder.len(),
            route_depth = route.depth(),
            "Engine started"
        );
        Ok(Self::new(route, builder.build(), config.cluster_name.clone()))
    }

    /// Route one event
    ///
    /// Never blocks: every receiver queue is fed with `try_send`.
    pub fn on_event(&self, mut event: KubeEvent) {
        if event.cluster_name.is_empty() && !self.cluster_name.is_empty() {
            event.cluster_name.clone_from(&self.cluster_name);
        }

        self.received.fetch_add(1, Ordering::Relaxed);
        counter!("event_exporter_events_received_total").increment(1);

        let event = Arc::new(event);
        self.route.process(&event, &self.registry);
    }

    /// Events handed to `on_event` so far
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events addressed to receivers that do not exist
    pub fn unknown_receiver_count(&self) -> u64 {
        self.registry.unknown_receiver_count()
    }

    /// Per-receiver metrics, in configuration order
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.registry.metrics()
    }

    /// Drain every receiver queue and close every sink
    ///
    /// Returns the final per-receiver metrics.
    #[instrument(name = "engine_shutdown", skip(self))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        debug!(received = self.received_count(), "Engine shutting down");
        self.registry.close().await
    }
}

/// Create the sink described by `config` and register it
#[instrument(
    name = "engine_register_receiver",
    skip(builder, config),
    fields(receiver = %config.name, sink_type = ?config.sink_type)
)]
async fn register_receiver(
    builder: &mut RegistryBuilder,
    config: &ReceiverConfig,
) -> Result<(), DispatcherError> {
    let name = config.name.as_str();
    let capacity = config.queue_capacity;
    let creation = |e: contracts::ContractError| DispatcherError::sink_creation(name, e.to_string());

    match (config.sink_type, &config.batch) {
        (SinkType::File, Some(batch)) => {
            let handler = FileBatchHandler::from_params(name, &config.params).map_err(creation)?;
            let sink = BatchedSink::start(name, writer_config(batch), handler);
            builder.register(name, sink, capacity)?;
        }
        (_, Some(_)) => {
            return Err(DispatcherError::sink_creation(
                name,
                "batching is only supported for file receivers",
            ));
        }
        (SinkType::Log, None) => {
            builder.register(name, LogSink::new(name), capacity)?;
        }
        (SinkType::Stdout, None) => {
            let dedot =
                parse_dedot(&config.params).map_err(|e| DispatcherError::sink_creation(name, e))?;
            builder.register(name, StdoutSink::new(name, dedot), capacity)?;
        }
        (SinkType::File, None) => {
            let sink = FileSink::from_params(name, &config.params).map_err(creation)?;
            builder.register(name, sink, capacity)?;
        }
        (SinkType::Udp, None) => {
            let sink = UdpSink::from_params(name, &config.params)
                .await
                .map_err(creation)?;
            builder.register(name, sink, capacity)?;
        }
    }
    Ok(())
}

/// Translate configured batch settings into writer settings
pub fn writer_config(settings: &BatchSettings) -> WriterConfig {
    WriterConfig {
        batch_size: settings.batch_size,
        max_retries: settings.max_retries,
        interval: Duration::from_millis(settings.flush_interval_ms),
        timeout: settings.flush_timeout_ms.map(Duration::from_millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::InMemorySink;
    use contracts::{ReceiverRegistry, RouteConfig, RuleConfig};
    use std::collections::HashMap;

    fn rule(namespace: &str, receiver: &str) -> RuleConfig {
        RuleConfig {
            namespace: namespace.into(),
            receiver: receiver.into(),
            ..Default::default()
        }
    }

    fn event_in(namespace: &str) -> KubeEvent {
        let mut ev = KubeEvent::default();
        ev.metadata.namespace = namespace.into();
        ev
    }

    #[tokio::test]
    async fn test_on_event_stamps_cluster_and_routes() {
        let sink = InMemorySink::new("mem");
        let events = sink.events();
        let mut builder = RegistryBuilder::new();
        builder.register("mem", sink, 10).unwrap();

        let route = Route::compile(&RouteConfig {
            matchers: vec![rule("kube-system", "mem")],
            ..Default::default()
        })
        .unwrap();
        let engine = Engine::new(route, builder.build(), "prod-eu");

        engine.on_event(event_in("kube-system"));
        engine.on_event(event_in("default"));
        let mut tagged = event_in("kube-system");
        tagged.cluster_name = "edge".into();
        engine.on_event(tagged);

        assert_eq!(engine.received_count(), 3);
        let report = engine.shutdown().await;
        assert_eq!(report[0].1.sent_count, 2);

        let received = events.snapshot();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].cluster_name, "prod-eu");
        assert_eq!(received[1].cluster_name, "edge");
        assert_eq!(events.close_count(), 1);
    }

    #[tokio::test]
    async fn test_from_config_builds_log_receivers() {
        let config = ExporterConfig {
            route: RouteConfig {
                matchers: vec![rule("", "dump"), rule("", "ghost")],
                ..Default::default()
            },
            receivers: vec![ReceiverConfig {
                name: "dump".into(),
                sink_type: SinkType::Log,
                queue_capacity: 10,
                params: HashMap::new(),
                batch: None,
            }],
            ..Default::default()
        };

        let engine = Engine::from_config(&config).await.unwrap();
        engine.on_event(event_in("default"));

        assert_eq!(engine.unknown_receiver_count(), 1);
        assert_eq!(engine.metrics()[0].0, "dump");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_from_config_rejects_batch_on_udp() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9".to_string());
        let config = ExporterConfig {
            receivers: vec![ReceiverConfig {
                name: "net".into(),
                sink_type: SinkType::Udp,
                queue_capacity: 10,
                params,
                batch: Some(BatchSettings::default()),
            }],
            ..Default::default()
        };

        let err = Engine::from_config(&config).await.err().unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { .. }));
    }

    #[tokio::test]
    async fn test_from_config_missing_file_path_fails() {
        let config = ExporterConfig {
            receivers: vec![ReceiverConfig {
                name: "file".into(),
                sink_type: SinkType::File,
                queue_capacity: 10,
                params: HashMap::new(),
                batch: None,
            }],
            ..Default::default()
        };

        assert!(Engine::from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_stdout_dedot() {
        let config = ExporterConfig {
            receivers: vec![ReceiverConfig {
                name: "console".into(),
                sink_type: SinkType::Stdout,
                queue_capacity: 10,
                params: HashMap::from([("dedot".to_string(), "yes".to_string())]),
                batch: None,
            }],
            ..Default::default()
        };

        let result = Engine::from_config(&config).await;
        assert!(matches!(
            result,
            Err(DispatcherError::SinkCreation { ref name, .. }) if name == "console"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_receivers_rejected() {
        let receiver = ReceiverConfig {
            name: "dup".into(),
            sink_type: SinkType::Log,
            queue_capacity: 1,
            params: HashMap::new(),
            batch: None,
        };
        let config = ExporterConfig {
            receivers: vec![receiver.clone(), receiver],
            ..Default::default()
        };

        let err = Engine::from_config(&config).await.err().unwrap();
        assert!(matches!(err, DispatcherError::DuplicateReceiver { .. }));
    }

    #[test]
    fn test_writer_config_translation() {
        let settings = BatchSettings {
            batch_size: 50,
            max_retries: 2,
            flush_interval_ms: 250,
            flush_timeout_ms: Some(5000),
        };
        let config = writer_config(&settings);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_registry_is_usable_through_trait() {
        let registry = RegistryBuilder::new().build();
        let as_trait: &dyn ReceiverRegistry = &registry;
        as_trait.send_event("nobody", &Arc::new(KubeEvent::default()));
        assert_eq!(registry.unknown_receiver_count(), 1);
        registry.close().await;
    }
}
