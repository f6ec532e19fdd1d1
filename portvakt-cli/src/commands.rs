use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use portvakt_config::PortvaktConfig;
use portvakt_storage::{AlertStore, SqliteAlertStore};
use portvakt_telemetry::EventLogger;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults and `PORTVAKT_*` variables still apply
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor a live interface
    Run(RunArgs),
    /// Feed a pcap savefile through the pipeline, then exit
    Replay(ReplayArgs),
    /// Print stored alerts as wire messages, newest last
    History(HistoryArgs),
    /// Delete every stored alert
    Purge,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(short, long)]
    pub interface: Option<String>,
    /// BPF filter expression
    #[arg(short, long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    #[arg(long)]
    pub file: PathBuf,
    #[arg(short, long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(short, long, default_value_t = 200)]
    pub limit: usize,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    EventLogger::init(&config.telemetry.log_level, config.telemetry.json)?;

    match cli.command {
        Commands::Run(args) => run_monitor(apply_run(config, args)).await,
        Commands::Replay(args) => run_monitor(apply_replay(config, args)).await,
        Commands::History(args) => {
            let store = open_store(&config)?;
            for record in store.recent(args.limit)? {
                println!("{}", record.to_wire_json()?);
            }
            Ok(())
        }
        Commands::Purge => {
            let deleted = open_store(&config)?.purge()?;
            println!("deleted {deleted} alerts");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PortvaktConfig> {
    let config = match path {
        Some(path) => PortvaktConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PortvaktConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

fn apply_run(mut config: PortvaktConfig, args: RunArgs) -> PortvaktConfig {
    if let Some(interface) = args.interface {
        config.capture.interface = interface;
    }
    if let Some(filter) = args.filter {
        config.capture.filter = filter;
    }
    config.capture.savefile = None;
    config
}

fn apply_replay(mut config: PortvaktConfig, args: ReplayArgs) -> PortvaktConfig {
    if let Some(filter) = args.filter {
        config.capture.filter = filter;
    }
    config.capture.savefile = Some(args.file);
    config
}

fn open_store(config: &PortvaktConfig) -> anyhow::Result<SqliteAlertStore> {
    SqliteAlertStore::open(
        &config.storage.path,
        Duration::from_millis(config.storage.busy_timeout_ms),
    )
    .with_context(|| format!("opening {}", config.storage.path.display()))
}

async fn run_monitor(config: PortvaktConfig) -> anyhow::Result<()> {
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: run until the source ends.
            std::future::pending::<()>().await;
        }
    };
    let summary = portvakt_engine::run(config, shutdown).await?;
    info!(
        packets = summary.capture.packets,
        relayed = summary.relay.relayed,
        "done"
    );
    Ok(())
}
