//! ExporterConfig - Config Loader output
//!
//! Describes the full exporter configuration: logging, the route tree and
//! the receivers it dispatches to. Pure data; compilation into matchers
//! happens in the routing crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Default log level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Stamped onto events that carry no cluster name
    #[serde(default)]
    pub cluster_name: String,

    /// Root of the route tree, evaluated against every event
    #[serde(default)]
    pub route: RouteConfig,

    /// Named destinations
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            cluster_name: String::new(),
            route: RouteConfig::default(),
            receivers: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Route node: drop rules, match rules and child routes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<RuleConfig>,

    #[serde(default, rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<RuleConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

/// Single rule; every string field is an unanchored regular expression.
/// Empty fields do not constrain the event.
/// Unknown keys are rejected so a misspelled field cannot widen a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub event_type: String,

    #[serde(default)]
    pub min_count: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Destination name; empty = gate only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Unique destination name referenced by rules
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Inbound queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Route the sink through a batch writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchSettings>,
}

/// Receiver queue capacity when the config leaves it out
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Tracing log output
    Log,
    /// JSON lines on stdout
    Stdout,
    /// JSON lines appended to a file
    File,
    /// JSON datagrams over UDP
    Udp,
}

/// Batch writer settings for a receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Per-flush deadline; unset = unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_timeout_ms: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            flush_interval_ms: default_flush_interval_ms(),
            flush_timeout_ms: None,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_flush_interval_ms() -> u64 {
    1000
}
