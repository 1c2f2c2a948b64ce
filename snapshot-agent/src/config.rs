//! Configuration management for the snapshot agent.
//!
//! Loads configuration from a TOML file; command-line flags override
//! individual values afterwards.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub journal: JournalConfig,
    pub archiver: ArchiverConfig,
    pub log: LogConfig,
    pub schedule: ScheduleConfig,
    pub performance: PerformanceConfig,
}

/// Which fingerprint decides whether a run can be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detection {
    /// Sorted entry names only; misses in-place edits
    #[default]
    Listing,
    /// Full file contents, read on every run
    Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory to back up
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory that receives archives (created if missing)
    #[serde(default = "default_destination_dir")]
    pub destination_dir: PathBuf,

    #[serde(default)]
    pub detection: Detection,

    /// Entry names skipped by both fingerprinting and archiving
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Append-only backup log
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Archive tool invoked with tar-compatible flags
    #[serde(default = "default_archiver_program")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Repeat the backup every N seconds; run once when unset
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Files read concurrently while computing the content fingerprint
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
}

// Default values
fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_destination_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("backup-log.txt")
}

fn default_archiver_program() -> String {
    "tar".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_read_concurrency() -> usize {
    8
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            destination_dir: default_destination_dir(),
            detection: Detection::default(),
            exclude: Vec::new(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: default_journal_path(),
        }
    }
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            program: default_archiver_program(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_concurrency: default_read_concurrency(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| BackupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.performance.read_concurrency == 0 {
            return Err(BackupError::Config(
                "performance.read_concurrency must be at least 1".to_string(),
            ));
        }
        if self.archiver.program.trim().is_empty() {
            return Err(BackupError::Config(
                "archiver.program must not be empty".to_string(),
            ));
        }
        if self.schedule.interval_secs == Some(0) {
            return Err(BackupError::Config(
                "schedule.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
