//! Snapshot Agent Library
//!
//! Change-aware directory backups: fingerprint a source directory, skip the
//! run when nothing changed since the last recorded success, otherwise
//! archive it and append the outcome to an append-only log.

pub mod archiver;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod fingerprint;
pub mod fs;
pub mod journal;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupExecutor, BackupJob, BackupOutcome};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
