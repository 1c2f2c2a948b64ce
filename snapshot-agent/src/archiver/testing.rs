//! Archiver doubles for tests.

use super::{ArchiveError, Archiver};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Writes a small placeholder file per call and counts invocations.
#[derive(Debug, Clone, Default)]
pub struct RecordingArchiver {
    calls: Arc<AtomicUsize>,
}

impl RecordingArchiver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Archiver for RecordingArchiver {
    async fn create_archive(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let path = destination_dir.join(format!("backup-{n}.tar.gz"));
        tokio::fs::write(&path, source_dir.to_string_lossy().as_bytes())
            .await
            .map_err(|e| ArchiveError::new(e.to_string()))?;
        Ok(path)
    }
}

/// Fails with the given message without touching the destination, after an
/// optional delay. Counts invocations.
#[derive(Debug, Clone)]
pub struct FailingArchiver {
    pub message: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FailingArchiver {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            delay: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Archiver for FailingArchiver {
    async fn create_archive(&self, _: &Path, _: &Path) -> Result<PathBuf, ArchiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(ArchiveError::new(self.message.clone()))
    }
}
