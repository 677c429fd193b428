//! poolscaled: operator binary for the poolscale autoscaler.
//!
//! # Usage
//!
//! ```text
//! poolscaled check --config /etc/poolscale/pools.toml
//! poolscaled plan --config pools.toml --pool pool-a --cpu 91 --ram 40 --size 3
//! poolscaled simulate --config pools.toml --cpu 90 --ram 50 --size 3 --duration 30m
//! ```
//!
//! `POOLSCALE_CONFIG` supplies `--config` when omitted. Logs go to stderr,
//! reports to stdout.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poolscale_core::AutoscalerConfig;

mod commands;

const DEFAULT_LOG_FILTER: &str = "info,poolscaled=debug,poolscale=debug";

#[derive(Parser)]
#[command(
    name = "poolscaled",
    about = "poolscale: threshold and schedule driven instance pool autoscaler",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every pool in a config file and summarize it.
    ///
    /// Exits non-zero when any pool is invalid.
    Check {
        #[arg(short, long, env = "POOLSCALE_CONFIG")]
        config: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show the decision for one pool given a utilization reading.
    Plan {
        #[arg(short, long, env = "POOLSCALE_CONFIG")]
        config: PathBuf,
        /// Pool ID as it appears in the config.
        #[arg(long)]
        pool: String,
        /// Average CPU utilization, percent.
        #[arg(long, allow_negative_numbers = true)]
        cpu: f64,
        /// Average memory utilization, percent.
        #[arg(long, allow_negative_numbers = true)]
        ram: f64,
        /// Current pool size.
        #[arg(long)]
        size: u32,
        /// Treat a schedule window as active.
        #[arg(long)]
        scheduler_active: bool,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Run every pool's loops against in-memory pools and constant metrics.
    Simulate {
        #[arg(short, long, env = "POOLSCALE_CONFIG")]
        config: PathBuf,
        /// Constant CPU utilization reported for every instance.
        #[arg(long)]
        cpu: f64,
        /// Constant memory utilization reported for every instance.
        #[arg(long)]
        ram: f64,
        /// Starting size of every pool.
        #[arg(long)]
        size: u32,
        /// Stop after this long ("90s", "30m"); otherwise run until Ctrl-C.
        #[arg(long, value_parser = parse_duration_arg)]
        duration: Option<Duration>,
    },
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    poolscale_core::config::parse_duration(s).map_err(|e| e.to_string())
}

fn init_tracing(log_format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log_format {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    match cli.command {
        Commands::Check { config, format } => {
            let loaded = AutoscalerConfig::from_file(&config)?;
            let now = chrono::Local::now().time();
            commands::check::check(&loaded, now, &format)
        }
        Commands::Plan {
            config,
            pool,
            cpu,
            ram,
            size,
            scheduler_active,
            format,
        } => {
            let loaded = AutoscalerConfig::from_file(&config)?;
            let input = commands::plan::PlanInput {
                cpu,
                ram,
                size,
                scheduler_active,
            };
            commands::plan::plan(&loaded, &pool, input, &format).await
        }
        Commands::Simulate {
            config,
            cpu,
            ram,
            size,
            duration,
        } => {
            let loaded = AutoscalerConfig::from_file(&config)?;
            commands::simulate::simulate(&loaded, cpu, ram, size, duration).await
        }
    }
}
