//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 路由引擎 -> receiver 的端到端流程
//! - 多 receiver 扇出、drop 规则、批量写入
//! - 入口统计与分发统计的一致性

#[cfg(test)]
mod contract_tests {
    use contracts::{ExporterConfig, KubeEvent, LogFormat};

    #[test]
    fn test_default_config_contract() {
        let config = ExporterConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::default());
        assert!(config.receivers.is_empty());
    }

    #[test]
    fn test_event_wire_names() {
        let event: KubeEvent = serde_json::from_str(
            r#"{
                "metadata": {"name": "pod.1", "namespace": "default", "uid": "u1"},
                "reason": "BackOff",
                "type": "Warning",
                "count": 2,
                "involvedObject": {"kind": "Pod", "apiVersion": "v1", "labels": {"app": "web"}},
                "source": {"component": "kubelet", "host": "node-1"},
                "clusterName": "prod"
            }"#,
        )
        .unwrap();

        assert_eq!(event.uid(), "u1");
        assert_eq!(event.event_type, "Warning");
        assert_eq!(event.involved_object.api_version, "v1");
        assert_eq!(event.source.host, "node-1");
        assert_eq!(event.cluster_name, "prod");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{KubeEvent, RouteConfig, RuleConfig};
    use dispatcher::{Engine, InMemorySink, RecordedEvents, RegistryBuilder};
    use observability::EventStatsAggregator;
    use routing::Route;

    fn event(uid: &str, namespace: &str, event_type: &str, reason: &str) -> KubeEvent {
        let mut ev = KubeEvent::default();
        ev.metadata.uid = uid.into();
        ev.metadata.namespace = namespace.into();
        ev.event_type = event_type.into();
        ev.reason = reason.into();
        ev
    }

    fn rule(receiver: &str) -> RuleConfig {
        RuleConfig {
            receiver: receiver.into(),
            ..Default::default()
        }
    }

    /// Read a JSON lines file back as events
    fn read_events(path: &Path) -> Vec<KubeEvent> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Vec::new();
        };
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn uids(events: &[KubeEvent]) -> Vec<&str> {
        events.iter().map(KubeEvent::uid).collect()
    }

    fn recorded_uids(events: &RecordedEvents) -> Vec<String> {
        events
            .snapshot()
            .iter()
            .map(|e| e.uid().to_string())
            .collect()
    }

    /// End-to-end test: YAML config -> ConfigLoader -> Engine -> file receivers
    ///
    /// 验证完整的数据流：
    /// 1. 根路由 drop kube-system
    /// 2. Warning 进入批量 file receiver，所有事件进入普通 file receiver
    /// 3. 子路由以 namespace 为门控，再按 reason 分发
    #[tokio::test]
    async fn test_e2e_yaml_config_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let all = dir.path().join("all.jsonl");
        let warnings = dir.path().join("warn/warnings.jsonl");
        let backoff = dir.path().join("backoff.jsonl");

        let yaml = format!(
            r#"
cluster_name: staging
route:
  drop:
    - namespace: "^kube-system$"
  match:
    - type: Warning
      receiver: warnings
    - receiver: all
  routes:
    - match:
        - namespace: "^prod-"
      routes:
        - match:
            - reason: BackOff
              receiver: backoff
receivers:
  - name: all
    sink_type: file
    params:
      path: {all}
  - name: warnings
    sink_type: file
    params:
      path: {warnings}
    batch:
      batch_size: 2
      flush_interval_ms: 50
  - name: backoff
    sink_type: file
    params:
      path: {backoff}
"#,
            all = all.display(),
            warnings = warnings.display(),
            backoff = backoff.display(),
        );

        let config = ConfigLoader::load_from_str(&yaml, ConfigFormat::Yaml).unwrap();
        let engine = Engine::from_config(&config).await.unwrap();

        let events = vec![
            event("1", "default", "Normal", "Pulled"),
            event("2", "kube-system", "Warning", "BackOff"),
            event("3", "prod-web", "Warning", "BackOff"),
            event("4", "prod-web", "Normal", "Started"),
            event("5", "default", "Warning", "FailedMount"),
        ];
        for ev in events {
            engine.on_event(ev);
        }

        assert_eq!(engine.received_count(), 5);
        let report = engine.shutdown().await;
        let names: Vec<_> = report.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["all", "warnings", "backoff"]);

        let all_events = read_events(&all);
        assert_eq!(uids(&all_events), vec!["1", "3", "4", "5"]);
        assert!(all_events.iter().all(|e| e.cluster_name == "staging"));

        assert_eq!(uids(&read_events(&warnings)), vec!["3", "5"]);
        assert_eq!(uids(&read_events(&backoff)), vec!["3"]);

        assert_eq!(report[0].1.sent_count, 4);
        assert_eq!(report[1].1.sent_count, 2);
        assert_eq!(report[2].1.sent_count, 1);
        assert!(report.iter().all(|(_, m)| m.dropped_count == 0));
    }

    /// A partial match at a node stops descent into its children
    #[tokio::test]
    async fn test_partial_match_blocks_subroutes() {
        let audit = InMemorySink::new("audit");
        let child = InMemorySink::new("child");
        let audit_events = audit.events();
        let child_events = child.events();

        let mut builder = RegistryBuilder::new();
        builder
            .register("audit", audit, 10)
            .unwrap()
            .register("child", child, 10)
            .unwrap();

        let route = Route::compile(&RouteConfig {
            matchers: vec![
                rule("audit"),
                RuleConfig {
                    event_type: "Warning".into(),
                    ..Default::default()
                },
            ],
            routes: vec![RouteConfig {
                matchers: vec![rule("child")],
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap();

        let engine = Engine::new(route, builder.build(), "");
        engine.on_event(event("n", "default", "Normal", "Pulled"));
        engine.on_event(event("w", "default", "Warning", "BackOff"));
        engine.shutdown().await;

        assert_eq!(recorded_uids(&audit_events), vec!["n", "w"]);
        assert_eq!(recorded_uids(&child_events), vec!["w"]);
        assert_eq!(audit_events.close_count(), 1);
        assert_eq!(child_events.close_count(), 1);
    }

    /// Label, annotation and count conditions all apply to the same event
    #[tokio::test]
    async fn test_label_and_count_routing() {
        let sink = InMemorySink::new("paging");
        let recorded = sink.events();

        let mut builder = RegistryBuilder::new();
        builder.register("paging", sink, 10).unwrap();

        let route = Route::compile(&RouteConfig {
            matchers: vec![RuleConfig {
                labels: HashMap::from([("tier".to_string(), "^critical$".to_string())]),
                min_count: 3,
                receiver: "paging".into(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap();
        let engine = Engine::new(route, builder.build(), "cluster-a");

        let mut hit = event("hit", "default", "Warning", "BackOff");
        hit.count = 5;
        hit.involved_object
            .labels
            .insert("tier".into(), "critical".into());

        let mut low_count = hit.clone();
        low_count.metadata.uid = "low".into();
        low_count.count = 1;

        let mut no_label = hit.clone();
        no_label.metadata.uid = "unlabelled".into();
        no_label.involved_object.labels.clear();

        let mut own_cluster = hit.clone();
        own_cluster.metadata.uid = "own".into();
        own_cluster.cluster_name = "cluster-b".into();

        for ev in [hit, low_count, no_label, own_cluster] {
            engine.on_event(ev);
        }
        engine.shutdown().await;

        let events = recorded.snapshot();
        assert_eq!(recorded_uids(&recorded), vec!["hit", "own"]);
        assert_eq!(events[0].cluster_name, "cluster-a");
        assert_eq!(events[1].cluster_name, "cluster-b");
    }

    /// One event fanned out to several receivers is shared, not copied
    #[tokio::test]
    async fn test_fan_out_shares_event() {
        let a = InMemorySink::new("a");
        let b = InMemorySink::new("b");
        let a_events = a.events();
        let b_events = b.events();

        let mut builder = RegistryBuilder::new();
        builder
            .register("a", a, 10)
            .unwrap()
            .register("b", b, 10)
            .unwrap();

        let route = Route::compile(&RouteConfig {
            matchers: vec![rule("a"), rule("b"), rule("missing")],
            ..Default::default()
        })
        .unwrap();
        let engine = Engine::new(route, builder.build(), "");

        engine.on_event(event("x", "default", "Normal", "Pulled"));
        assert_eq!(engine.unknown_receiver_count(), 1);
        engine.shutdown().await;

        let a_seen = a_events.snapshot();
        let b_seen = b_events.snapshot();
        assert_eq!(a_seen.len(), 1);
        assert!(Arc::ptr_eq(&a_seen[0], &b_seen[0]));
    }

    /// Events reach a UDP receiver as one JSON datagram each
    #[tokio::test]
    async fn test_udp_receiver_from_config() {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let yaml = format!(
            r#"
route:
  match:
    - reason: "^Killing$"
      receiver: collector
receivers:
  - name: collector
    sink_type: udp
    params:
      addr: "{addr}"
"#
        );
        let config = ConfigLoader::load_from_str(&yaml, ConfigFormat::Yaml).unwrap();
        let engine = Engine::from_config(&config).await.unwrap();

        engine.on_event(event("skip", "default", "Normal", "Pulled"));
        engine.on_event(event("kill", "default", "Normal", "Killing"));

        let mut buf = vec![0u8; 65_536];
        let len = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            socket.recv(&mut buf),
        )
        .await
        .unwrap()
        .unwrap();
        let received: KubeEvent = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(received.uid(), "kill");

        let report = engine.shutdown().await;
        assert_eq!(report[0].1.sent_count, 1);
    }

    /// Input-side statistics agree with what the engine routed
    #[tokio::test]
    async fn test_input_stats_match_engine() {
        let config = ConfigLoader::load_from_str(
            r#"
route:
  match:
    - receiver: dump
receivers:
  - name: dump
    sink_type: log
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();
        let engine = Engine::from_config(&config).await.unwrap();
        let mut stats = EventStatsAggregator::new();

        for (i, kind) in ["Normal", "Warning", "Warning", "Normal"].iter().enumerate() {
            let ev = event(&i.to_string(), "default", kind, "Test");
            stats.update(&ev);
            engine.on_event(ev);
        }

        assert_eq!(stats.total_events, engine.received_count());
        let summary = stats.summary();
        assert!((summary.warning_rate - 50.0).abs() < 1e-9);

        let report = engine.shutdown().await;
        assert_eq!(report[0].1.sent_count, 4);
    }

    /// A receiver that cannot be built fails the whole engine
    #[tokio::test]
    async fn test_invalid_receiver_fails_startup() {
        let mut config = ConfigLoader::load_from_str(
            r#"
receivers:
  - name: out
    sink_type: file
    params:
      path: /tmp/unused.jsonl
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();
        config.receivers[0].params.clear();

        let err = Engine::from_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("out"), "got: {err}");
    }
}
