//! `run` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::ExporterConfig;
use dispatcher::Engine;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{EventReader, RunStats};

/// Why the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    EndOfInput,
    MaxEvents,
    Signal,
}

/// Execute the `run` command
pub async fn run_exporter(args: &RunArgs, mut config: ExporterConfig) -> Result<()> {
    // Apply CLI overrides
    if let Some(ref cluster_name) = args.cluster_name {
        info!(cluster_name = %cluster_name, "Overriding cluster name from CLI");
        config.cluster_name = cluster_name.clone();
    }

    info!(
        config = %args.config.display(),
        cluster_name = %config.cluster_name,
        receivers = config.receivers.len(),
        route_rules = config.route.matchers.len() + config.route.drop.len(),
        subroutes = config.route.routes.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let engine = Engine::from_config(&config)
        .await
        .context("Failed to build routing engine")?;

    let mut reader = EventReader::open(args.events.as_deref())
        .await
        .context("Failed to open event input")?;

    let max_events = (args.max_events != 0).then_some(args.max_events);
    let mut stats = RunStats::default();
    let started = Instant::now();

    info!(
        input = %args.events.as_ref().map_or("stdin".into(), |p| p.display().to_string()),
        "Routing events..."
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let reason = loop {
        if max_events.is_some_and(|max| stats.events_routed >= max) {
            break StopReason::MaxEvents;
        }

        let next = tokio::select! {
            next = reader.next_event() => next,
            _ = &mut shutdown => break StopReason::Signal,
        };

        match next {
            Ok(Some(event)) => {
                stats.input.update(&event);
                engine.on_event(event);
                stats.events_routed += 1;
            }
            Ok(None) => break StopReason::EndOfInput,
            Err(e) if e.is_recoverable() => {
                stats.input.record_parse_failure();
                warn!(error = %e, "Skipping malformed event");
            }
            Err(e) => {
                error!(error = %e, "Event input failed, shutting down");
                let report = engine.shutdown().await;
                warn!(receivers = report.len(), "Receivers drained after input failure");
                return Err(e.into());
            }
        }
    };

    if reason == StopReason::Signal {
        warn!("Received shutdown signal, draining receivers...");
    }

    stats.unknown_receiver = engine.unknown_receiver_count();
    stats.receivers = engine.shutdown().await;
    stats.duration = started.elapsed();

    info!(
        reason = ?reason,
        lines_read = reader.lines_read(),
        events_routed = stats.events_routed,
        dropped = stats.total_dropped(),
        duration_secs = stats.duration.as_secs_f64(),
        eps = format!("{:.2}", stats.eps()),
        receivers = %stats.receivers_json().unwrap_or_default(),
        "Event exporter finished"
    );

    stats.print_summary();
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &ExporterConfig) {
    println!("\n=== Configuration Summary ===\n");
    if !config.cluster_name.is_empty() {
        println!("Cluster: {}", config.cluster_name);
    }
    println!(
        "Route: {} drop rules, {} match rules, {} subroutes",
        config.route.drop.len(),
        config.route.matchers.len(),
        config.route.routes.len()
    );

    println!("\nReceivers ({}):", config.receivers.len());
    for receiver in &config.receivers {
        let batching = if receiver.batch.is_some() {
            ", batched"
        } else {
            ""
        };
        println!(
            "  - {} ({:?}, queue {}{})",
            receiver.name, receiver.sink_type, receiver.queue_capacity, batching
        );
    }

    println!();
}
