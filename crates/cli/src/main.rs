//! # Event Exporter CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 事件路由与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use contracts::ExporterConfig;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{load_config, run_exporter, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // `run` takes its log settings from the config file, so load it first
    let result = match &cli.command {
        Commands::Run(args) => {
            let config = load_config(&args.config)?;
            init_logging(&cli, Some(&config), args.metrics_port())?;
            log_startup();
            run_exporter(args, config).await
        }
        Commands::Validate(args) => {
            init_logging(&cli, None, None)?;
            log_startup();
            run_validate(args)
        }
        Commands::Info(args) => {
            init_logging(&cli, None, None)?;
            log_startup();
            run_info(args)
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn log_startup() {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Event exporter CLI starting"
    );
}

/// Initialize logging (and metrics) from config defaults plus CLI overrides
fn init_logging(
    cli: &Cli,
    config: Option<&ExporterConfig>,
    metrics_port: Option<u16>,
) -> Result<()> {
    let mut obs = match config {
        Some(config) => ObservabilityConfig::from_exporter(config, metrics_port),
        None => ObservabilityConfig {
            log_format: contracts::LogFormat::Pretty,
            ..Default::default()
        },
    };

    if let Some(format) = cli.log_format {
        obs.log_format = format.into();
    }
    if cli.quiet {
        obs.default_log_level = "warn".to_string();
    } else if cli.verbose > 0 {
        obs.default_log_level = if cli.verbose == 1 { "debug" } else { "trace" }.to_string();
    }

    observability::init_with_config(obs).context("Failed to initialize logging")
}
