//! Per-record version history.
//!
//! Every successful insert and update appends a snapshot to the history of
//! its `(table, key)` pair. Histories are never pruned, so any past state of
//! a record can be read back with [`VersionArchive::at`].
//!
//! ## Layout
//!
//! ```text
//! <root>/history/<table>_<sanitized key>.json
//! <root>/history/<table>_<sanitized key>.<kind>.json
//! ```
//!
//! Text keys use the first form. Any other key kind carries its kind name
//! (`integer`, `float`, ...) before the extension, so `Integer(1)` and
//! `Text("1")` never share a file.
//!
//! Each file is a JSON array of `{"timestamp": <secs>, "data": {...}}`
//! objects, oldest first, rewritten whole on every append.

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::types::Timestamp;
use docket_codec::{CodecError, Document, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// One archived snapshot of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// When the snapshot was taken.
    pub timestamp: Timestamp,
    /// The full document as of that time.
    pub data: Document,
}

/// Append-only snapshot store keyed by `(table, key)`.
///
/// Keys are mapped to file names by replacing every non-alphanumeric
/// character with `_`, so distinct keys such as `a-b` and `a_b` share one
/// history file. Table names may contain `_` as well, so table `a` with key
/// `b_c` and table `a_b` with key `c` also share `a_b_c.json`.
#[derive(Debug)]
pub struct VersionArchive {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write of history files.
    write_lock: Mutex<()>,
}

impl VersionArchive {
    /// Opens the archive rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            clock,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the history files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the history file for `(table, key)`.
    #[must_use]
    pub fn path_for(&self, table: &str, key: &Value) -> PathBuf {
        let name = match key {
            Value::Text(s) => format!("{table}_{}.json", sanitize(s)),
            // Sanitized names never contain '.', so the kind suffix cannot
            // collide with a text key.
            other => format!(
                "{table}_{}.{}.json",
                sanitize(&other.to_json()),
                other.kind_name()
            ),
        };
        self.dir.join(name)
    }

    /// Appends a snapshot and returns the timestamp it was stored under.
    ///
    /// `timestamp` defaults to the archive clock. A history file that fails
    /// to parse is replaced by a fresh one.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be written.
    pub fn archive(
        &self,
        table: &str,
        key: &Value,
        document: &Document,
        timestamp: Option<Timestamp>,
    ) -> CoreResult<Timestamp> {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        let path = self.path_for(table, key);

        let _guard = self.write_lock.lock();
        let mut history = read_history(&path);
        history.push(VersionEntry {
            timestamp,
            data: document.clone(),
        });
        let bytes = serde_json::to_vec(&history)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        fs::write(&path, bytes)?;
        Ok(timestamp)
    }

    /// Full history of `(table, key)`, oldest first.
    #[must_use]
    pub fn history(&self, table: &str, key: &Value) -> Vec<VersionEntry> {
        read_history(&self.path_for(table, key))
    }

    /// The document as it was at `timestamp`.
    ///
    /// Walks from the oldest entry and stops at the first one newer than
    /// `timestamp`; `None` if the first entry is already newer.
    #[must_use]
    pub fn at(&self, table: &str, key: &Value, timestamp: Timestamp) -> Option<Document> {
        self.history(table, key)
            .into_iter()
            .take_while(|entry| entry.timestamp <= timestamp)
            .last()
            .map(|entry| entry.data)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn read_history(path: &Path) -> Vec<VersionEntry> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read history file");
            return Vec::new();
        }
    };
    serde_json::from_slice(&data).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "corrupt history file, starting fresh");
        Vec::new()
    })
}
