//! Archive creation boundary.
//!
//! The executor only needs "turn directory D into one archive file under
//! destination P, or fail with a readable message"; [`Archiver`] is that
//! seam. [`tar::TarArchiver`] shells out to the system `tar`.

pub mod tar;

use crate::journal::entry::format_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use self::tar::TarArchiver;

#[cfg(test)]
pub(crate) mod testing;

/// Failure reported by an archiver; the message is recorded verbatim in the
/// backup log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ArchiveError {
    message: String,
}

impl ArchiveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Compress `source_dir` into a new file inside `destination_dir` and
    /// return its path. `destination_dir` already exists when this is called.
    async fn create_archive(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
    ) -> Result<PathBuf, ArchiveError>;
}

/// `backup-<timestamp>.tar.gz` with `:` and `.` replaced by `-`.
pub fn archive_file_name(timestamp: &DateTime<Utc>) -> String {
    format!(
        "backup-{}.tar.gz",
        format_timestamp(timestamp).replace([':', '.'], "-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_archive_file_name() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 30).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(archive_file_name(&ts), "backup-2026-10-19T08-15-30-123Z.tar.gz");
    }

    #[test]
    fn test_archive_error_displays_message_only() {
        assert_eq!(ArchiveError::new("disk full").to_string(), "disk full");
    }
}
