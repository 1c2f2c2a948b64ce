//! Custom error types for the snapshot agent.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read source directory {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create destination directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Archive(#[from] crate::archiver::ArchiveError),

    #[error("Failed to write backup log {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    /// Whether the audit trail itself could not be written.
    pub fn is_log_write(&self) -> bool {
        matches!(self, BackupError::LogWrite { .. })
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
