//! Rule - compiled predicate over event fields, labels and annotations

use std::fmt;

use contracts::{KubeEvent, RuleConfig};
use regex::Regex;

use crate::error::RoutingError;

type FieldAccessor = fn(&KubeEvent) -> &str;
type ConfigAccessor = fn(&RuleConfig) -> &str;

/// (field name, rule pattern, event value) for every regex-matched field
const FIELDS: [(&str, ConfigAccessor, FieldAccessor); 8] = [
    ("message", |c| c.message.as_str(), |e| e.message.as_str()),
    ("api_version", |c| c.api_version.as_str(), |e| e.involved_object.api_version.as_str()),
    ("kind", |c| c.kind.as_str(), |e| e.involved_object.kind.as_str()),
    ("namespace", |c| c.namespace.as_str(), |e| e.metadata.namespace.as_str()),
    ("reason", |c| c.reason.as_str(), |e| e.reason.as_str()),
    ("type", |c| c.event_type.as_str(), |e| e.event_type.as_str()),
    ("component", |c| c.component.as_str(), |e| e.source.component.as_str()),
    ("host", |c| c.host.as_str(), |e| e.source.host.as_str()),
];

struct FieldMatcher {
    field: &'static str,
    value: FieldAccessor,
    pattern: Regex,
}

struct KeyMatcher {
    key: String,
    pattern: Regex,
}

/// Compiled rule
///
/// Every pattern is an unanchored, case-sensitive regular expression.
/// Empty field patterns are skipped at compile time, so a rule built from an
/// empty config matches every event.
pub struct Rule {
    fields: Vec<FieldMatcher>,
    labels: Vec<KeyMatcher>,
    annotations: Vec<KeyMatcher>,
    min_count: i32,
    receiver: Option<String>,
}

impl Rule {
    /// Compile a rule, failing on the first invalid pattern
    pub fn compile(config: &RuleConfig) -> Result<Self, RoutingError> {
        let mut fields = Vec::new();
        for (field, pattern_of, value) in FIELDS {
            let pattern = pattern_of(config);
            if pattern.is_empty() {
                continue;
            }
            fields.push(FieldMatcher {
                field,
                value,
                pattern: compile_pattern(field, pattern)?,
            });
        }

        let labels = compile_keys("labels", config.labels.iter())?;
        let annotations = compile_keys("annotations", config.annotations.iter())?;

        let receiver = if config.receiver.is_empty() {
            None
        } else {
            Some(config.receiver.clone())
        };

        Ok(Self {
            fields,
            labels,
            annotations,
            min_count: config.min_count,
            receiver,
        })
    }

    /// Destination; `None` for gate-only rules
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    /// Whether the event satisfies every constraint of this rule
    pub fn matches(&self, event: &KubeEvent) -> bool {
        let fields_match = self
            .fields
            .iter()
            .all(|m| m.pattern.is_match((m.value)(event)));
        if !fields_match {
            return false;
        }

        // Every configured key must be present on the involved object
        let object = &event.involved_object;
        let keys_match = self.labels.iter().all(|m| matches_key(m, &object.labels))
            && self
                .annotations
                .iter()
                .all(|m| matches_key(m, &object.annotations));

        keys_match && event.count >= self.min_count
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field(
                "fields",
                &self
                    .fields
                    .iter()
                    .map(|m| (m.field, m.pattern.as_str()))
                    .collect::<Vec<_>>(),
            )
            .field(
                "labels",
                &self.labels.iter().map(|m| &m.key).collect::<Vec<_>>(),
            )
            .field(
                "annotations",
                &self.annotations.iter().map(|m| &m.key).collect::<Vec<_>>(),
            )
            .field("min_count", &self.min_count)
            .field("receiver", &self.receiver)
            .finish()
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, RoutingError> {
    Regex::new(pattern).map_err(|e| RoutingError::invalid_pattern(field, pattern, e))
}

fn compile_keys<'a>(
    kind: &str,
    entries: impl Iterator<Item = (&'a String, &'a String)>,
) -> Result<Vec<KeyMatcher>, RoutingError> {
    let mut matchers = entries
        .map(|(key, pattern)| {
            Ok(KeyMatcher {
                key: key.clone(),
                pattern: compile_pattern(&format!("{kind}.{key}"), pattern)?,
            })
        })
        .collect::<Result<Vec<_>, RoutingError>>()?;
    matchers.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(matchers)
}

fn matches_key(matcher: &KeyMatcher, map: &std::collections::HashMap<String, String>) -> bool {
    map.get(&matcher.key)
        .is_some_and(|value| matcher.pattern.is_match(value))
}
