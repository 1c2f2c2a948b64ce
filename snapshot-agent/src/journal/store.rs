//! Append-only backup log file.
//!
//! Assumes a single writer at a time; concurrent runs against the same file
//! may interleave appends.

use super::entry::{LogEntry, Outcome};
use crate::fingerprint::Fingerprint;
use crate::utils::errors::{BackupError, Result};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Backup log backed by a single text file
#[derive(Debug, Clone)]
pub struct BackupLog {
    path: PathBuf,
}

impl BackupLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash recorded by the most recent successful backup.
    ///
    /// A missing, empty or unreadable log, or one with no success entry,
    /// all mean "no prior backup".
    pub async fn read_last_hash(&self) -> Option<Fingerprint> {
        let contents = match self.read_contents().await {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("No backup log at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read backup log {}: {}", self.path.display(), e);
                return None;
            }
        };

        contents
            .lines()
            .rev()
            .filter_map(LogEntry::parse)
            .find(|entry| entry.outcome == Outcome::Success && entry.hash.is_some())
            .and_then(|entry| entry.hash)
    }

    /// All entries that match the line grammar, oldest first.
    pub async fn entries(&self) -> io::Result<Vec<LogEntry>> {
        let Some(contents) = self.read_contents().await? else {
            return Ok(Vec::new());
        };

        let mut skipped = 0usize;
        let entries: Vec<LogEntry> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let parsed = LogEntry::parse(line);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();

        if skipped > 0 {
            debug!("Skipped {} unrecognised lines in {}", skipped, self.path.display());
        }

        Ok(entries)
    }

    /// Append one entry, creating the file if needed.
    ///
    /// The entry goes out in a single write and is synced before returning.
    /// If the previous write was torn (no trailing newline) the new entry is
    /// started on a fresh line.
    pub async fn append(&self, entry: &LogEntry) -> Result<()> {
        self.append_line(&entry.to_string())
            .await
            .map_err(|source| BackupError::LogWrite {
                path: self.path.clone(),
                source,
            })
    }

    async fn append_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        let mut buf = String::with_capacity(line.len() + 2);
        if file.metadata().await?.len() > 0 {
            file.seek(SeekFrom::End(-1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                buf.push('\n');
            }
        }
        buf.push_str(line);
        buf.push('\n');

        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        Ok(())
    }

    /// `Ok(None)` when the file does not exist.
    async fn read_contents(&self) -> io::Result<Option<String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn success(hash: &Fingerprint) -> LogEntry {
        LogEntry::success(
            Utc::now(),
            Path::new("/backups/backup.tar.gz"),
            &Fingerprint::of("content"),
            hash,
        )
    }

    #[tokio::test]
    async fn test_missing_log_has_no_hash() {
        let temp_dir = TempDir::new().unwrap();
        let log = BackupLog::new(temp_dir.path().join("backup-log.txt"));

        assert_eq!(log.read_last_hash().await, None);
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_log_has_no_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup-log.txt");
        std::fs::write(&path, "").unwrap();

        assert_eq!(BackupLog::new(path).read_last_hash().await, None);
    }

    #[tokio::test]
    async fn test_unreadable_log_has_no_hash() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let log = BackupLog::new(temp_dir.path());

        assert_eq!(log.read_last_hash().await, None);
    }

    #[tokio::test]
    async fn test_last_hash_wins() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log = BackupLog::new(temp_dir.path().join("backup-log.txt"));

        let first = Fingerprint::of("first");
        let second = Fingerprint::of("second");
        log.append(&success(&first)).await?;
        log.append(&success(&second)).await?;
        log.append(&LogEntry::failure(Utc::now(), "disk full")).await?;

        assert_eq!(log.read_last_hash().await, Some(second));
        assert_eq!(log.entries().await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup-log.txt");
        let hash = Fingerprint::of("kept");

        let contents = format!(
            "not a log line\n{}\n\u{fffd}\u{0}binary\n2026-01-01T00:00:00.000Z: SUCCESS: Backup created at /x, HASH: deadbeef\n",
            success(&hash)
        );
        std::fs::write(&path, contents)?;

        let log = BackupLog::new(&path);
        assert_eq!(log.read_last_hash().await, Some(hash));
        assert_eq!(log.entries().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_after_torn_write() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup-log.txt");
        let hash = Fingerprint::of("after");

        std::fs::write(&path, "2026-01-01T00:00:00.000Z: SUCCESS: Backup created at /x, HA")?;

        let log = BackupLog::new(&path);
        log.append(&success(&hash)).await?;

        let raw = std::fs::read_to_string(&path)?;
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));
        assert_eq!(log.read_last_hash().await, Some(hash));
        Ok(())
    }

    #[tokio::test]
    async fn test_append_creates_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup-log.txt");
        let log = BackupLog::new(&path);

        log.append(&LogEntry::failure(Utc::now(), "disk full")).await?;

        let raw = std::fs::read_to_string(&path)?;
        assert!(raw.trim_end().ends_with("FAILED: disk full"));
        Ok(())
    }

    #[tokio::test]
    async fn test_append_failure_is_log_write_error() {
        let temp_dir = TempDir::new().unwrap();
        let log = BackupLog::new(temp_dir.path().join("missing-dir").join("backup-log.txt"));

        let err = log
            .append(&LogEntry::failure(Utc::now(), "x"))
            .await
            .unwrap_err();
        assert!(err.is_log_write());
    }
}
