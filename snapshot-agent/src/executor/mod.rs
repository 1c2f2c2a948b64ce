//! Backup job executor - decides whether a backup is needed and records
//! what happened.
//!
//! A run moves through these phases:
//! - CHECK: fingerprint the source and read the last recorded hash
//! - SKIP: fingerprints match exactly, nothing is written
//! - ARCHIVE: ensure the destination exists and invoke the archiver
//! - LOGGED_SUCCESS / LOGGED_FAILURE: append the outcome to the backup log
//!
//! Every failure after CHECK starts is written to the log as a FAILED entry
//! and returned as [`BackupOutcome::Failed`]. Only a failure to append to the
//! log escapes as an error.

use crate::archiver::Archiver;
use crate::config::{Config, Detection};
use crate::fingerprint::{fingerprint_contents, fingerprint_listing, Fingerprint};
use crate::fs::walker::{relative_inside, WalkOptions};
use crate::journal::{BackupLog, LogEntry};
use crate::utils::errors::{BackupError, Result};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Backup job configuration
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub detection: Detection,
    pub exclude: Vec<String>,
    pub read_concurrency: usize,
}

impl BackupJob {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_dir: config.backup.source_dir.clone(),
            destination_dir: config.backup.destination_dir.clone(),
            detection: config.backup.detection,
            exclude: config.backup.exclude.clone(),
            read_concurrency: config.performance.read_concurrency,
        }
    }

    /// The destination and the log are skipped when they live inside the
    /// source, otherwise every run would see its own output as a change.
    fn walk_options(&self, log_path: &Path) -> WalkOptions {
        let exclude_paths = [self.destination_dir.as_path(), log_path]
            .into_iter()
            .filter_map(|path| relative_inside(&self.source_dir, path))
            .collect();

        WalkOptions {
            exclude_patterns: self.exclude.clone(),
            exclude_paths,
        }
    }
}

/// Result of one backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Source unchanged since the last successful backup
    Skipped { fingerprint: Fingerprint },

    /// New archive written and recorded
    Created {
        archive_path: PathBuf,
        content_hash: Fingerprint,
        fingerprint: Fingerprint,
    },

    /// Attempt failed; the reason was recorded in the log
    Failed { reason: String },
}

impl BackupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, BackupOutcome::Failed { .. })
    }
}

impl fmt::Display for BackupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupOutcome::Skipped { fingerprint } => {
                write!(f, "skipped: no changes since last backup ({fingerprint})")
            }
            BackupOutcome::Created {
                archive_path,
                content_hash,
                ..
            } => write!(
                f,
                "created: {} (content {content_hash})",
                archive_path.display()
            ),
            BackupOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Main backup executor
pub struct BackupExecutor<A> {
    log: BackupLog,
    archiver: A,
}

impl<A: Archiver> BackupExecutor<A> {
    pub fn new(log: BackupLog, archiver: A) -> Self {
        Self { log, archiver }
    }

    pub fn log(&self) -> &BackupLog {
        &self.log
    }

    /// Execute a backup job
    pub async fn execute(&self, job: &BackupJob) -> Result<BackupOutcome> {
        let start_time = std::time::Instant::now();

        info!(
            "Checking {} for changes ({:?} detection)",
            job.source_dir.display(),
            job.detection
        );

        let fingerprint = match self.skip_key(job).await {
            Ok(fingerprint) => fingerprint,
            Err(source) => {
                return self
                    .record_failure(BackupError::SourceUnreadable {
                        path: job.source_dir.clone(),
                        source,
                    })
                    .await;
            }
        };

        match self.log.read_last_hash().await {
            Some(last) if last == fingerprint => {
                info!("No changes since last backup ({}), skipping", fingerprint);
                return Ok(BackupOutcome::Skipped { fingerprint });
            }
            Some(last) => info!("Change detected (last {}, now {})", last, fingerprint),
            None => info!("No prior backup recorded"),
        }

        let (archive_path, content_hash) = match self.archive(job).await {
            Ok(created) => created,
            Err(e) => return self.record_failure(e).await,
        };

        let entry = LogEntry::success(Utc::now(), &archive_path, &content_hash, &fingerprint);
        self.append(&entry).await?;

        info!(
            "Backup completed: {} in {:.2}s",
            archive_path.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(BackupOutcome::Created {
            archive_path,
            content_hash,
            fingerprint,
        })
    }

    /// Fingerprint compared against the log to decide skip-vs-proceed.
    async fn skip_key(&self, job: &BackupJob) -> std::io::Result<Fingerprint> {
        let options = job.walk_options(self.log.path());
        match job.detection {
            Detection::Listing => fingerprint_listing(&job.source_dir, &options).await,
            Detection::Content => {
                fingerprint_contents(&job.source_dir, &options, job.read_concurrency).await
            }
        }
    }

    async fn archive(&self, job: &BackupJob) -> Result<(PathBuf, Fingerprint)> {
        tokio::fs::create_dir_all(&job.destination_dir)
            .await
            .map_err(|source| BackupError::Destination {
                path: job.destination_dir.clone(),
                source,
            })?;

        let archive_path = self
            .archiver
            .create_archive(&job.source_dir, &job.destination_dir)
            .await?;

        let options = job.walk_options(self.log.path());
        let content_hash = fingerprint_contents(&job.source_dir, &options, job.read_concurrency)
            .await
            .map_err(|source| BackupError::SourceUnreadable {
                path: job.source_dir.clone(),
                source,
            })?;

        Ok((archive_path, content_hash))
    }

    async fn record_failure(&self, err: BackupError) -> Result<BackupOutcome> {
        let reason = err.to_string();
        error!("Backup failed: {}", reason);

        self.append(&LogEntry::failure(Utc::now(), &reason)).await?;

        Ok(BackupOutcome::Failed { reason })
    }

    async fn append(&self, entry: &LogEntry) -> Result<()> {
        self.log.append(entry).await.inspect_err(|e| {
            error!("Audit trail compromised, outcome not recorded: {}", e);
        })
    }
}
