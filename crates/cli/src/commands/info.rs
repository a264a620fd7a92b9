//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{ExporterConfig, RouteConfig, RuleConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    cluster_name: &'a str,
    log_level: &'a str,
    receivers: Vec<ReceiverInfo<'a>>,
    route: &'a RouteConfig,
}

#[derive(Serialize)]
struct ReceiverInfo<'a> {
    name: &'a str,
    sink_type: String,
    queue_capacity: usize,
    batched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a HashMap<String, String>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = super::load_config(&args.config)?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info<'a>(config: &'a ExporterConfig, args: &InfoArgs) -> ConfigInfo<'a> {
    let receivers = config
        .receivers
        .iter()
        .map(|r| ReceiverInfo {
            name: &r.name,
            sink_type: format!("{:?}", r.sink_type),
            queue_capacity: r.queue_capacity,
            batched: r.batch.is_some(),
            params: args.params.then_some(&r.params),
        })
        .collect();

    ConfigInfo {
        cluster_name: &config.cluster_name,
        log_level: &config.log_level,
        receivers,
        route: &config.route,
    }
}

fn print_config_info(config: &ExporterConfig, args: &InfoArgs) {
    println!("=== Event Exporter Configuration ===\n");

    println!("Cluster: {}", display_or(&config.cluster_name, "(unset)"));
    println!("Log: {} ({:?})", config.log_level, config.log_format);

    println!("\nReceivers ({})", config.receivers.len());
    for (i, receiver) in config.receivers.iter().enumerate() {
        let is_last = i == config.receivers.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({:?}, queue {})",
            prefix, receiver.name, receiver.sink_type, receiver.queue_capacity
        );
        if let Some(batch) = &receiver.batch {
            println!(
                "   {}  batch: size={} retries={} interval={}ms",
                child_prefix, batch.batch_size, batch.max_retries, batch.flush_interval_ms
            );
        }
        if args.params {
            let mut params: Vec<_> = receiver.params.iter().collect();
            params.sort();
            for (key, value) in params {
                println!("   {}  {} = {}", child_prefix, key, value);
            }
        }
    }

    println!("\nRoute");
    print_route(&config.route, "   ");
    println!();
}

fn print_route(route: &RouteConfig, indent: &str) {
    for rule in &route.drop {
        println!("{}drop  {}", indent, describe_rule(rule));
    }
    for rule in &route.matchers {
        println!("{}match {}", indent, describe_rule(rule));
    }
    for (i, child) in route.routes.iter().enumerate() {
        println!("{}routes[{}]", indent, i);
        print_route(child, &format!("{indent}   "));
    }
}

/// One-line description of a rule's non-empty conditions
fn describe_rule(rule: &RuleConfig) -> String {
    let mut parts = Vec::new();
    let fields = [
        ("apiVersion", &rule.api_version),
        ("kind", &rule.kind),
        ("namespace", &rule.namespace),
        ("reason", &rule.reason),
        ("type", &rule.event_type),
        ("message", &rule.message),
        ("component", &rule.component),
        ("host", &rule.host),
    ];
    for (name, pattern) in fields {
        if !pattern.is_empty() {
            parts.push(format!("{name}={pattern}"));
        }
    }

    let mut labels: Vec<_> = rule.labels.iter().collect();
    labels.sort();
    parts.extend(labels.into_iter().map(|(k, v)| format!("labels.{k}={v}")));

    let mut annotations: Vec<_> = rule.annotations.iter().collect();
    annotations.sort();
    parts.extend(
        annotations
            .into_iter()
            .map(|(k, v)| format!("annotations.{k}={v}")),
    );

    if rule.min_count > 0 {
        parts.push(format!("count>={}", rule.min_count));
    }

    let conditions = if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(" ")
    };
    if rule.receiver.is_empty() {
        conditions
    } else {
        format!("{} -> {}", conditions, rule.receiver)
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
