//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Event Exporter - routes Kubernetes events to configured receivers
#[derive(Parser, Debug)]
#[command(
    name = "event-exporter",
    author,
    version,
    about = "Kubernetes event routing and export",
    long_about = "Routes Kubernetes events through a rule tree and exports them to\n\
                  named receivers (log, stdout, file, udp).\n\n\
                  Events are read as newline-delimited JSON from a file or stdin."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENT_EXPORTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (defaults to the config file's log_format)
    #[arg(long, value_enum, global = true, env = "EVENT_EXPORTER_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route events until input ends or a shutdown signal arrives
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display receivers and the route tree
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (YAML, TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.yaml",
        env = "EVENT_EXPORTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Newline-delimited JSON events to route (stdin when omitted)
    #[arg(short, long, env = "EVENT_EXPORTER_EVENTS")]
    pub events: Option<PathBuf>,

    /// Override the cluster name from configuration
    #[arg(long, env = "EVENT_EXPORTER_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Stop after routing this many events (0 = unlimited)
    #[arg(long, default_value = "0", env = "EVENT_EXPORTER_MAX_EVENTS")]
    pub max_events: u64,

    /// Validate configuration and exit without routing
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVENT_EXPORTER_METRICS_PORT")]
    pub metrics_port: u16,
}

impl RunArgs {
    /// Metrics port, `None` when disabled
    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port != 0).then_some(self.metrics_port)
    }
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show receiver parameters
    #[arg(long)]
    pub params: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
