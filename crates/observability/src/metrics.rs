//! 事件指标收集模块
//!
//! 入口侧指标 (接收、解析失败、事件延迟) 与运行期聚合统计。
//! 分发侧计数器由 dispatcher / batch_writer 直接上报。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use contracts::KubeEvent;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// 注册全部指标说明
///
/// 安装 Prometheus recorder 之后调用一次。
pub fn describe_metrics() {
    describe_counter!(
        "event_exporter_events_received_total",
        "Events handed to the routing engine"
    );
    describe_counter!(
        "event_exporter_events_dispatched_total",
        "Events accepted into a receiver queue"
    );
    describe_counter!(
        "event_exporter_events_sent_total",
        "Sink send results per receiver"
    );
    describe_counter!(
        "event_exporter_events_dropped_total",
        "Events dropped because a receiver queue was full"
    );
    describe_counter!(
        "event_exporter_unknown_receiver_total",
        "Events addressed to receivers that are not registered"
    );
    describe_counter!(
        "event_exporter_batch_flushes_total",
        "Batch writer handler invocations"
    );
    describe_counter!(
        "event_exporter_batch_items_dropped_total",
        "Batched items dropped after exhausting retries"
    );
    describe_counter!(
        "event_exporter_input_events_total",
        "Events decoded from the input stream, by type"
    );
    describe_counter!(
        "event_exporter_input_parse_failures_total",
        "Input lines that could not be decoded as events"
    );
    describe_histogram!(
        "event_exporter_event_lag_ms",
        Unit::Milliseconds,
        "Delay between event timestamp and ingestion"
    );
}

/// 记录事件接收 (按 type 分类)
pub fn record_event_received(event_type: &str) {
    counter!(
        "event_exporter_input_events_total",
        "type" => event_type.to_string()
    )
    .increment(1);
}

/// 记录输入解析失败
pub fn record_parse_failure() {
    counter!("event_exporter_input_parse_failures_total").increment(1);
}

/// 记录事件延迟
pub fn record_event_lag_ms(lag_ms: f64) {
    histogram!("event_exporter_event_lag_ms").record(lag_ms);
}

/// 事件统计聚合器
///
/// 在内存中聚合入口侧统计，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct EventStatsAggregator {
    /// 总事件数
    pub total_events: u64,

    /// 解析失败行数
    pub parse_failures: u64,

    /// 各 type 计数 (Normal / Warning)
    pub type_counts: HashMap<String, u64>,

    /// 各 namespace 计数
    pub namespace_counts: HashMap<String, u64>,

    /// 事件延迟统计 (毫秒)
    pub lag_stats: RunningStats,
}

impl EventStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计，并上报对应指标
    pub fn update(&mut self, event: &KubeEvent) {
        self.update_at(event, Utc::now());
    }

    /// 以给定时间为 "当前时间" 更新
    pub fn update_at(&mut self, event: &KubeEvent, now: DateTime<Utc>) {
        self.total_events += 1;
        record_event_received(&event.event_type);

        *self
            .type_counts
            .entry(event.event_type.clone())
            .or_insert(0) += 1;
        *self
            .namespace_counts
            .entry(event.namespace().to_string())
            .or_insert(0) += 1;

        if let Some(ts) = event.timestamp() {
            let lag_ms = (now - ts).num_milliseconds().max(0) as f64;
            self.lag_stats.push(lag_ms);
            record_event_lag_ms(lag_ms);
        }
    }

    /// 记录一次解析失败
    pub fn record_parse_failure(&mut self) {
        self.parse_failures += 1;
        record_parse_failure();
    }

    /// 生成摘要报告
    pub fn summary(&self) -> EventStatsSummary {
        let mut namespaces: Vec<_> = self
            .namespace_counts
            .iter()
            .map(|(ns, count)| (ns.clone(), *count))
            .collect();
        namespaces.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        namespaces.truncate(5);

        EventStatsSummary {
            total_events: self.total_events,
            parse_failures: self.parse_failures,
            warning_rate: if self.total_events > 0 {
                self.type_counts.get("Warning").copied().unwrap_or(0) as f64
                    / self.total_events as f64
                    * 100.0
            } else {
                0.0
            },
            lag_ms: StatsSummary::from(&self.lag_stats),
            top_namespaces: namespaces,
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct EventStatsSummary {
    pub total_events: u64,
    pub parse_failures: u64,
    pub warning_rate: f64,
    pub lag_ms: StatsSummary,
    /// 事件最多的 namespace (最多 5 个，降序)
    pub top_namespaces: Vec<(String, u64)>,
}

impl std::fmt::Display for EventStatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Event Input Summary ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "Parse failures: {}", self.parse_failures)?;
        writeln!(f, "Warnings: {:.2}%", self.warning_rate)?;
        writeln!(f, "Event lag (ms): {}", self.lag_ms)?;

        if !self.top_namespaces.is_empty() {
            writeln!(f, "Top namespaces:")?;
            for (namespace, count) in &self.top_namespaces {
                writeln!(f, "  {}: {}", namespace, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(namespace: &str, event_type: &str) -> KubeEvent {
        let mut ev = KubeEvent::default();
        ev.metadata.namespace = namespace.into();
        ev.event_type = event_type.into();
        ev
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = EventStatsAggregator::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 10).unwrap();

        let mut late = event("kube-system", "Warning");
        late.first_timestamp = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        aggregator.update_at(&late, now);
        aggregator.update_at(&event("kube-system", "Normal"), now);
        aggregator.update_at(&event("default", "Normal"), now);
        aggregator.record_parse_failure();

        assert_eq!(aggregator.total_events, 3);
        assert_eq!(aggregator.parse_failures, 1);
        assert_eq!(aggregator.type_counts.get("Normal"), Some(&2));
        assert_eq!(aggregator.lag_stats.count(), 1);
        assert!((aggregator.lag_stats.mean() - 10_000.0).abs() < 1e-6);

        let summary = aggregator.summary();
        assert_eq!(summary.top_namespaces[0], ("kube-system".to_string(), 2));
        assert!((summary.warning_rate - 100.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_display() {
        let summary = EventStatsSummary {
            total_events: 100,
            parse_failures: 2,
            warning_rate: 5.0,
            lag_ms: StatsSummary::default(),
            top_namespaces: vec![("default".to_string(), 90)],
        };

        let output = format!("{}", summary);
        assert!(output.contains("Total events: 100"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("Event lag (ms): N/A"));
        assert!(output.contains("default: 90"));
    }
}
