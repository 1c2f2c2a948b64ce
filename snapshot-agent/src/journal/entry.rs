//! Line grammar of the backup log.
//!
//! ```text
//! <RFC 3339 timestamp>: SUCCESS: Backup created at <path>, CONTENT: <hex64>, HASH: <hex64>
//! <RFC 3339 timestamp>: FAILED: <message>
//! ```
//!
//! `HASH:` is always the last field of a success line. Lines that do not fit
//! the grammar are reported as unmatched and never treated as errors.
//!
//! `HASH:` holds the fingerprint the next run compares against (the listing
//! fingerprint unless content detection is configured). The content
//! fingerprint sits in the extra `CONTENT:` field just before it. Readers
//! that take everything between `Backup created at ` and `, HASH: ` as the
//! archive path will therefore see `<path>, CONTENT: <hex64>`; split on the
//! last `, CONTENT: ` as [`LogEntry::archive_path`] does.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::path::Path;

const HASH_FIELD: &str = ", HASH: ";
const CONTENT_FIELD: &str = ", CONTENT: ";
const CREATED_PREFIX: &str = "Backup created at ";

/// Outcome recorded for a backup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failed => "FAILED",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "SUCCESS" => Some(Outcome::Success),
            "FAILED" => Some(Outcome::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One parsed line of the backup log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    /// Everything after the outcome keyword, minus the trailing `HASH:` field
    pub message: String,
    /// Skip key recorded by a successful backup
    pub hash: Option<Fingerprint>,
}

impl LogEntry {
    /// Entry for a completed archive.
    pub fn success(
        timestamp: DateTime<Utc>,
        archive_path: &Path,
        content: &Fingerprint,
        hash: &Fingerprint,
    ) -> Self {
        let path = single_line(&archive_path.to_string_lossy());
        Self {
            timestamp,
            outcome: Outcome::Success,
            message: format!("{CREATED_PREFIX}{path}{CONTENT_FIELD}{content}"),
            hash: Some(hash.clone()),
        }
    }

    /// Entry for a failed attempt.
    pub fn failure(timestamp: DateTime<Utc>, reason: &str) -> Self {
        Self {
            timestamp,
            outcome: Outcome::Failed,
            message: single_line(reason),
            hash: None,
        }
    }

    /// Match a raw log line against the grammar.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        // RFC 3339 timestamps contain ':' but never ": "
        let (timestamp, rest) = line.split_once(": ")?;
        let (keyword, body) = rest.split_once(": ")?;

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        let outcome = Outcome::from_keyword(keyword)?;

        let (message, hash) = match outcome {
            Outcome::Success => match body.rsplit_once(HASH_FIELD) {
                // A malformed hash (e.g. a torn write) rejects the whole line
                Some((message, hash)) => (message, Some(hash.trim().parse::<Fingerprint>().ok()?)),
                None => (body, None),
            },
            Outcome::Failed => (body, None),
        };

        Some(Self {
            timestamp,
            outcome,
            message: message.to_string(),
            hash,
        })
    }

    /// Archive path of a success entry.
    pub fn archive_path(&self) -> Option<&str> {
        let rest = self.message.strip_prefix(CREATED_PREFIX)?;
        Some(rest.rsplit_once(CONTENT_FIELD).map_or(rest, |(path, _)| path))
    }

    /// Content fingerprint of a success entry, when one was recorded.
    pub fn content_hash(&self) -> Option<Fingerprint> {
        let (_, content) = self.message.rsplit_once(CONTENT_FIELD)?;
        content.trim().parse().ok()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            format_timestamp(&self.timestamp),
            self.outcome,
            self.message
        )?;
        if let Some(hash) = &self.hash {
            write!(f, "{HASH_FIELD}{hash}")?;
        }
        Ok(())
    }
}

/// ISO 8601 / RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A log entry must stay on one line.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
