//! On-disk JSONL audit writer.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::entry::TapeEntry;

/// Append-only JSONL writer for one session's audit file.
///
/// Each record is written with open-append-sync-close so external tailers
/// can read concurrently and a crash never leaves a half-buffered line
/// in userspace.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Create a writer for `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The audit file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a JSON line.
    pub fn append(&self, entry: &TapeEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::other(format!("audit serialization: {e}")))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()
    }

    /// Append one entry, logging and swallowing any failure.
    ///
    /// Audit writes must never abort a turn; a broken disk degrades the
    /// audit trail, not the session.
    pub fn record(&self, entry: &TapeEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(path = %self.path.display(), error = %e, "audit write failed");
        }
    }
}
