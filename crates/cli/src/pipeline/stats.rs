//! Run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::EventStatsAggregator;
use serde::Serialize;

/// Statistics from one `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Wall time from first read to shutdown complete
    pub duration: Duration,

    /// Events handed to the engine
    pub events_routed: u64,

    /// Events addressed to receivers that do not exist
    pub unknown_receiver: u64,

    /// Input-side aggregation
    pub input: EventStatsAggregator,

    /// Final per-receiver metrics, in registration order
    pub receivers: Vec<(String, MetricsSnapshot)>,
}

/// Serializable per-receiver line of the report
#[derive(Debug, Serialize)]
struct ReceiverReport<'a> {
    name: &'a str,
    sent: u64,
    failed: u64,
    dropped: u64,
}

impl RunStats {
    /// Routed events per second
    pub fn eps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_routed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Events dropped on full queues, across all receivers
    pub fn total_dropped(&self) -> u64 {
        self.receivers.iter().map(|(_, m)| m.dropped_count).sum()
    }

    /// Per-receiver report as JSON
    pub fn receivers_json(&self) -> serde_json::Result<String> {
        let report: Vec<_> = self
            .receivers
            .iter()
            .map(|(name, m)| ReceiverReport {
                name,
                sent: m.sent_count,
                failed: m.failure_count,
                dropped: m.dropped_count,
            })
            .collect();
        serde_json::to_string(&report)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events routed: {}", self.events_routed);
        println!("   ├─ Events/s: {:.2}", self.eps());
        println!("   └─ Unknown receiver hits: {}", self.unknown_receiver);

        println!("\n{}", self.input.summary());

        if !self.receivers.is_empty() {
            println!("Receivers ({})", self.receivers.len());
            for (i, (name, m)) in self.receivers.iter().enumerate() {
                let prefix = if i == self.receivers.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: sent={} failed={} dropped={}",
                    prefix, name, m.sent_count, m.failure_count, m.dropped_count
                );
            }
        }

        println!();
    }
}
