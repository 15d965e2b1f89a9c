#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use checkup::logs::LogStoreError;
use checkup::monitoring::OutcomeProcessor;
use checkup::{
    AlertDispatcher, AlertSender, CheckExecutor, CheckPipeline, FileLogStore, FileStore,
    LogRotator, LogSender, LogStore, RecordStore, Scheduler, SqlStore, TwilioSender,
};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;

use config::{AlertProvider, Config, StorageBackend};

#[derive(Debug, Parser)]
#[command(name = "checkup-worker", version, about = "Uptime check evaluation worker")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/checkup/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output; repeat for trace level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler and the log rotator until interrupted
    Run,
    /// Evaluate every check once and wait for the results
    Tick,
    /// Rotate all active audit logs once
    Rotate,
    /// Inspect audit logs
    #[command(subcommand)]
    Logs(LogsCommand),
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum LogsCommand {
    /// List log ids
    List {
        /// Include rotated logs
        #[arg(short, long)]
        all: bool,
    },
    /// Print a log; rotated logs are decompressed
    Show { id: String },
}

/// Everything the worker commands operate on
struct Worker {
    store: Arc<dyn RecordStore>,
    logs: Arc<FileLogStore>,
    pipeline: Arc<CheckPipeline>,
}

impl Worker {
    async fn build(config: &Config) -> Result<Self> {
        let store: Arc<dyn RecordStore> = match config.storage.backend {
            StorageBackend::File => Arc::new(FileStore::new(&config.storage.data_dir)),
            StorageBackend::Libsql => Arc::new(
                SqlStore::open(&config.storage.database_path)
                    .await
                    .with_context(|| {
                        format!("failed to open {}", config.storage.database_path.display())
                    })?,
            ),
        };

        let logs = Arc::new(FileLogStore::new(&config.logs.dir));
        let dispatcher = Arc::new(AlertDispatcher::new(store.clone(), alert_sender(config)?));
        let processor = OutcomeProcessor::new(store.clone(), logs.clone(), dispatcher);
        let executor = CheckExecutor::http().context("failed to build HTTP client")?;
        let pipeline = Arc::new(CheckPipeline::new(executor, processor));

        Ok(Self { store, logs, pipeline })
    }

    fn scheduler(&self, config: &Config) -> Scheduler {
        Scheduler::new(
            self.store.clone(),
            self.pipeline.clone(),
            Duration::from_secs(config.scheduler.interval_seconds.max(1)),
        )
    }

    fn rotator(&self, config: &Config) -> LogRotator {
        LogRotator::new(
            self.logs.clone(),
            Duration::from_secs(config.rotation.interval_seconds.max(1)),
        )
    }
}

fn alert_sender(config: &Config) -> Result<Arc<dyn AlertSender>> {
    let twilio = &config.alerts.twilio;

    match config.alerts.provider {
        AlertProvider::Twilio if twilio.is_complete() => Ok(Arc::new(
            TwilioSender::new(twilio.clone()).context("failed to build Twilio client")?,
        )),
        AlertProvider::Twilio => {
            warn!("Twilio credentials incomplete, alerts will only be logged");
            Ok(Arc::new(LogSender))
        }
        AlertProvider::Log => Ok(Arc::new(LogSender)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine
    dotenvy::dotenv().ok();
    logger::init(logger::level_from_verbosity(cli.verbose, cli.quiet));

    let mut config = Config::from_config(cli.config.as_ref()).context("failed to load config")?;
    config.apply_env();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Tick => tick(&config).await,
        Command::Rotate => {
            let worker = Worker::build(&config).await?;
            let summary = worker.rotator(&config).rotate_all().await;
            println!("{} rotated, {} failed", summary.rotated, summary.failed);
            Ok(())
        }
        Command::Logs(command) => logs(&config, command).await,
        Command::Config => {
            print!("{config}");
            Ok(())
        }
    }
}

async fn run(config: &Config) -> Result<()> {
    let worker = Worker::build(config).await?;
    let token = CancellationToken::new();

    let scheduler = worker.scheduler(config).start(token.clone());
    let rotator = worker.rotator(config).start(token.clone());

    info!("Worker started");
    shutdown_signal().await;
    info!("Shutting down");

    token.cancel();
    scheduler.await.context("scheduler task panicked")?;
    rotator.await.context("rotator task panicked")?;

    let delivered = worker.pipeline.drain_alerts().await;
    info!(delivered, "Worker stopped");

    Ok(())
}

async fn tick(config: &Config) -> Result<()> {
    let worker = Worker::build(config).await?;
    let token = CancellationToken::new();

    let pending = worker.scheduler(config).tick(&token).await.context("failed to list checks")?;
    let summary = pending.await.context("tick aborted")?;
    worker.pipeline.drain_alerts().await;

    println!(
        "{} up, {} down, {} alerts, {} skipped, {} failed",
        summary.up, summary.down, summary.alerts, summary.skipped, summary.failed
    );
    Ok(())
}

async fn logs(config: &Config, command: LogsCommand) -> Result<()> {
    let logs = FileLogStore::new(&config.logs.dir);

    match command {
        LogsCommand::List { all } => {
            for id in logs.list(all).await.context("failed to list logs")? {
                println!("{id}");
            }
        }
        LogsCommand::Show { id } => {
            let text = match logs.read(&id).await {
                Err(LogStoreError::NotFound(_)) => logs.decompress(&id).await,
                other => other,
            }
            .with_context(|| format!("failed to read log {id}"))?;
            print!("{text}");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
