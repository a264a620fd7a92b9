//! `validate` command implementation.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use contracts::{ExporterConfig, RouteConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    cluster_name: String,
    receiver_count: usize,
    batched_receivers: usize,
    route_depth: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    cluster_name: config.cluster_name.clone(),
                    receiver_count: config.receivers.len(),
                    batched_receivers: config
                        .receivers
                        .iter()
                        .filter(|r| r.batch.is_some())
                        .count(),
                    route_depth: route_depth(&config.route),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ExporterConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.receivers.is_empty() {
        warnings.push("No receivers configured - every event will be discarded".to_string());
    }

    if is_empty_route(&config.route) {
        warnings.push("Route has no rules - no event will reach a receiver".to_string());
    }

    let mut referenced = BTreeSet::new();
    collect_receivers(&config.route, &mut referenced);
    for receiver in &config.receivers {
        if !referenced.contains(receiver.name.as_str()) {
            warnings.push(format!(
                "Receiver '{}' is never referenced by the route",
                receiver.name
            ));
        }
    }

    if config.cluster_name.is_empty() {
        warnings.push("cluster_name is empty - events keep their own cluster name".to_string());
    }

    warnings
}

fn is_empty_route(route: &RouteConfig) -> bool {
    route.drop.is_empty() && route.matchers.is_empty() && route.routes.iter().all(is_empty_route)
}

fn collect_receivers<'a>(route: &'a RouteConfig, out: &mut BTreeSet<&'a str>) {
    out.extend(
        route
            .matchers
            .iter()
            .chain(&route.drop)
            .filter(|r| !r.receiver.is_empty())
            .map(|r| r.receiver.as_str()),
    );
    for child in &route.routes {
        collect_receivers(child, out);
    }
}

fn route_depth(route: &RouteConfig) -> usize {
    1 + route.routes.iter().map(route_depth).max().unwrap_or(0)
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            if !summary.cluster_name.is_empty() {
                println!("\n  Cluster: {}", summary.cluster_name);
            }
            println!("  Receivers: {}", summary.receiver_count);
            println!("  Batched receivers: {}", summary.batched_receivers);
            println!("  Route depth: {}", summary.route_depth);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
