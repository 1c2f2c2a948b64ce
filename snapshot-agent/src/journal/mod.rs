//! Append-only audit log of backup attempts.

pub mod entry;
pub mod store;

pub use entry::{LogEntry, Outcome};
pub use store::BackupLog;
