use std::env;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use schedule_app::{load_config, purge, run, PDF_DIR_ENV};
use schedule_logging::{tracker_error, LogDestination};

/// Tracks terminal flight-schedule PDFs and keeps one canonical copy per type.
#[derive(Parser)]
#[command(name = "schedule_tracker", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./tracker.toml")]
    config: PathBuf,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log: LevelFilter,

    /// Log file, truncated on every start.
    #[arg(long, global = true, default_value = "./tracker.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, classify and promote schedules for every terminal.
    Run,
    /// Delete everything in the scratch area.
    Purge,
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("unknown log level {raw:?}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    schedule_logging::initialize(LogDestination::Both, cli.log, &cli.log_file);

    let config = load_config(&cli.config, env::var(PDF_DIR_ENV).ok())
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let result = match cli.command {
        Command::Purge => purge(&config),
        Command::Run => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")
            .and_then(|runtime| runtime.block_on(run(&config)).map(|_| ())),
    };

    if let Err(err) = &result {
        tracker_error!("{err:#}");
    }
    result
}
