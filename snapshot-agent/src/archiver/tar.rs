//! Archiver backed by an external `tar` binary.

use super::{archive_file_name, ArchiveError, Archiver};
use crate::fs::walker::{normalize_separators, relative_inside};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `<program> [--exclude=<pattern>...] -czf <archive> -C <source> .`
///
/// Excluded names are matched literally as whole path components, the same
/// way the walker matches them; wildcard characters are escaped before they
/// reach `tar`.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    program: String,
    exclude: Vec<String>,
    exclude_paths: Vec<PathBuf>,
}

impl TarArchiver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            exclude: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }

    /// Entry names left out of the archive (kept in sync with the walker's
    /// exclude list so fingerprints describe what was archived).
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Files or directories left out of the archive whenever they lie inside
    /// the source, such as the backup log. The destination directory is
    /// always treated this way.
    pub fn with_exclude_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.exclude_paths = paths;
        self
    }

    fn command(&self, source_dir: &Path, destination_dir: &Path, archive_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(
            self.exclude
                .iter()
                .map(|name| format!("--exclude={}", escape_wildcards(name))),
        );

        // Never archive our own output
        let own_output = std::iter::once(destination_dir)
            .chain(self.exclude_paths.iter().map(PathBuf::as_path));
        for path in own_output {
            if let Some(inside) = relative_inside(source_dir, path) {
                let member = normalize_separators(&inside);
                cmd.arg(format!("--exclude=./{}", escape_wildcards(&member)));
            }
        }

        cmd.arg("-czf")
            .arg(normalize_separators(archive_path))
            .arg("-C")
            .arg(normalize_separators(source_dir))
            .arg(".")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Backslash-escape the characters `tar` would expand in an exclude pattern.
fn escape_wildcards(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new("tar")
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn create_archive(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let archive_path = destination_dir.join(archive_file_name(&Utc::now()));

        if tokio::fs::try_exists(&archive_path).await.unwrap_or(false) {
            return Err(ArchiveError::new(format!(
                "archive {} already exists",
                archive_path.display()
            )));
        }

        debug!("Running {} for {}", self.program, source_dir.display());

        let output = self
            .command(source_dir, destination_dir, &archive_path)
            .output()
            .await
            .map_err(|e| ArchiveError::new(format!("failed to run {}: {}", self.program, e)))?;

        if output.status.success() {
            info!("Archive written: {}", archive_path.display());
            return Ok(archive_path);
        }

        // Leave nothing half-written behind
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove partial archive {}: {}", archive_path.display(), e);
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", self.program, output.status)
        } else {
            stderr
        };

        Err(ArchiveError::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_escape_wildcards() {
        assert_eq!(escape_wildcards("*.tmp"), "\\*.tmp");
        assert_eq!(escape_wildcards("a[1]?"), "a\\[1\\]\\?");
        assert_eq!(escape_wildcards("plain"), "plain");
    }

    #[test]
    fn test_command_excludes_own_output() {
        let source = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let archiver = TarArchiver::default()
            .with_exclude(vec!["*.tmp".to_string()])
            .with_exclude_paths(vec![
                source.path().join("backup-log.txt"),
                outside.path().join("elsewhere.txt"),
            ]);

        let dest = source.path().join("backups");
        let cmd = archiver.command(source.path(), &dest, &dest.join("backup-x.tar.gz"));
        let args = args(&cmd);

        assert_eq!(
            &args[..3],
            ["--exclude=\\*.tmp", "--exclude=./backups", "--exclude=./backup-log.txt"]
        );
        assert_eq!(args[3], "-czf");
        assert_eq!(args.last().map(String::as_str), Some("."));
        assert!(!args.iter().any(|a| a.contains("elsewhere")));
    }

    fn tar_available() -> bool {
        std::process::Command::new("tar")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_creates_tar_gz() {
        if !tar_available() {
            return;
        }

        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), b"foo").unwrap();

        let path = TarArchiver::default()
            .create_archive(source.path(), dest.path())
            .await
            .unwrap();

        assert_eq!(path.parent(), Some(dest.path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("backup-"));
        assert!(name.ends_with(".tar.gz"));
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_destination_inside_source() {
        if !tar_available() {
            return;
        }

        let source = TempDir::new().unwrap();
        let dest = source.path().join("backups");
        fs::create_dir(&dest).unwrap();
        fs::write(source.path().join("a.txt"), b"foo").unwrap();

        let archiver = TarArchiver::default();
        archiver.create_archive(source.path(), &dest).await.unwrap();

        let listing = std::process::Command::new("tar")
            .arg("-tzf")
            .arg(fs::read_dir(&dest).unwrap().next().unwrap().unwrap().path())
            .output()
            .unwrap();
        let members = String::from_utf8_lossy(&listing.stdout);
        assert!(members.contains("a.txt"));
        assert!(!members.contains("backups"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_excludes_are_literal_and_skip_the_log() {
        if !tar_available() {
            return;
        }

        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("a.tmp"), b"keep").unwrap();
        fs::write(source.path().join("*.tmp"), b"drop").unwrap();
        fs::write(source.path().join("backup-log.txt"), b"log").unwrap();

        let archive = TarArchiver::default()
            .with_exclude(vec!["*.tmp".to_string()])
            .with_exclude_paths(vec![source.path().join("backup-log.txt")])
            .create_archive(source.path(), dest.path())
            .await
            .unwrap();

        let listing = std::process::Command::new("tar")
            .arg("-tzf")
            .arg(&archive)
            .output()
            .unwrap();
        let members: Vec<String> = String::from_utf8_lossy(&listing.stdout)
            .lines()
            .map(|l| l.trim_start_matches("./").to_string())
            .collect();
        assert!(members.iter().any(|m| m == "a.tmp"));
        assert!(!members.iter().any(|m| m == "*.tmp"));
        assert!(!members.iter().any(|m| m == "backup-log.txt"));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        let err = TarArchiver::new("definitely-not-a-real-archiver")
            .create_archive(source.path(), dest.path())
            .await
            .unwrap_err();

        assert!(err.message().starts_with("failed to run definitely-not-a-real-archiver"));
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failing_tool_leaves_no_archive() {
        if !tar_available() {
            return;
        }

        let dest = TempDir::new().unwrap();
        let missing_source = dest.path().join("no-such-source");

        let result = TarArchiver::default()
            .create_archive(&missing_source, dest.path())
            .await;

        assert!(result.is_err());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }
}
