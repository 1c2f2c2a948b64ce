//! Snapshot Agent - Main entry point
//!
//! Change-aware directory backups with an append-only audit log.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use snapshot_agent::{
    archiver::TarArchiver,
    config::{Config, Detection},
    daemon::{self, ShutdownCoordinator},
    journal::{entry::format_timestamp, BackupLog},
    utils, BackupExecutor, BackupJob,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Backup log file (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up the source directory if it changed since the last backup
    Run(RunArgs),

    /// Show the hash recorded by the last successful backup
    Status,

    /// List recorded backup attempts, newest last
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Directory to back up (overrides config)
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Directory receiving archives (overrides config)
    #[arg(short, long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Change detection strategy (overrides config)
    #[arg(long, value_enum)]
    detection: Option<DetectionArg>,

    /// Repeat every N seconds until interrupted (overrides config)
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DetectionArg {
    Listing,
    Content,
}

impl From<DetectionArg> for Detection {
    fn from(arg: DetectionArg) -> Self {
        match arg {
            DetectionArg::Listing => Detection::Listing,
            DetectionArg::Content => Detection::Content,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(log_file) = args.log_file {
        config.journal.path = log_file;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let log = BackupLog::new(&config.journal.path);

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(run) => {
            apply_run_overrides(&mut config, run);
            config.validate()?;
            run_backups(&config, log).await
        }
        Command::Status => {
            match log.read_last_hash().await {
                Some(hash) => println!("{hash}"),
                None => println!("no prior backup"),
            }
            Ok(())
        }
        Command::History { limit } => {
            let entries = log.entries().await?;
            for entry in entries.iter().skip(entries.len().saturating_sub(limit)) {
                println!(
                    "{}  {:<7}  {}",
                    format_timestamp(&entry.timestamp),
                    entry.outcome,
                    entry.archive_path().unwrap_or(&entry.message)
                );
            }
            Ok(())
        }
    }
}

fn apply_run_overrides(config: &mut Config, run: RunArgs) {
    if let Some(source) = run.source {
        config.backup.source_dir = source;
    }
    if let Some(destination) = run.destination {
        config.backup.destination_dir = destination;
    }
    if let Some(detection) = run.detection {
        config.backup.detection = detection.into();
    }
    if let Some(interval) = run.interval {
        config.schedule.interval_secs = Some(interval);
    }
}

async fn run_backups(config: &Config, log: BackupLog) -> Result<()> {
    tracing::info!("Starting snapshot-agent v{}", env!("CARGO_PKG_VERSION"));

    let archiver = TarArchiver::new(config.archiver.program.clone())
        .with_exclude(config.backup.exclude.clone())
        .with_exclude_paths(vec![config.journal.path.clone()]);
    let executor = BackupExecutor::new(log, archiver);
    let job = BackupJob::from_config(config);

    let Some(secs) = config.schedule.interval_secs else {
        // A recorded failure still counts as a completed run
        let outcome = executor.execute(&job).await?;
        println!("{outcome}");
        return Ok(());
    };

    let shutdown_coordinator = ShutdownCoordinator::new();
    let runner = daemon::run_every(
        &executor,
        &job,
        Duration::from_secs(secs),
        shutdown_coordinator.subscribe(),
    );
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => return Ok(result?),
        _ = shutdown_coordinator.wait_for_signal() => {}
    }

    // Let an in-flight run record its outcome
    runner.await?;
    tracing::info!("Shutdown complete");

    Ok(())
}
