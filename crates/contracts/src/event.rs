//! KubeEvent - Watcher output
//!
//! Enriched cluster event as it enters the routing engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ContractError;

/// Object metadata attached to the event itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    /// Stable identity, used by sinks that dedupe
    #[serde(default)]
    pub uid: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// Component that reported the event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub host: String,
}

/// The object the event describes, enriched with its labels and annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub uid: String,

    #[serde(default)]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// Enriched event
///
/// Read-only once it enters the routing engine. The only sanctioned
/// transform is [`KubeEvent::dedot`], which returns a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeEvent {
    #[serde(default)]
    pub metadata: EventMeta,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    /// Severity tag (`Normal`, `Warning`)
    #[serde(default, rename = "type")]
    pub event_type: String,

    /// Occurrence count
    #[serde(default)]
    pub count: i32,

    #[serde(default)]
    pub source: EventSource,

    #[serde(default)]
    pub involved_object: InvolvedObject,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
}

impl KubeEvent {
    /// Event UID
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Namespace the event was recorded in
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Copy with `.` replaced by `_` in every label and annotation key.
    ///
    /// Required by sinks whose backends treat dots in keys as object paths.
    pub fn dedot(&self) -> KubeEvent {
        let mut copy = self.clone();
        copy.metadata.labels = dedot_map(&self.metadata.labels);
        copy.metadata.annotations = dedot_map(&self.metadata.annotations);
        copy.involved_object.labels = dedot_map(&self.involved_object.labels);
        copy.involved_object.annotations = dedot_map(&self.involved_object.annotations);
        copy
    }

    /// First timestamp, falling back to the event time
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.first_timestamp.or(self.event_time)
    }

    /// Serialize to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>, ContractError> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn dedot_map(map: &HashMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.replace('.', "_"), v.clone()))
        .collect()
}
