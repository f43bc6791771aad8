//! Primary key index.

use crate::error::CoreResult;
use crate::index::persistence::{self, IndexKind};
use docket_codec::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps each primary key to the offset of its current record.
///
/// Holds at most one offset per key. Keys iterate in [`Value`]'s total
/// order.
#[derive(Debug, Default)]
pub struct PrimaryIndex {
    path: Option<PathBuf>,
    entries: BTreeMap<Value, u64>,
}

impl PrimaryIndex {
    /// Opens the index persisted at `path`, empty if missing or corrupt.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let entries: Vec<(Value, u64)> = persistence::load_or_default(IndexKind::Primary, path);
        Self {
            path: Some(path.to_path_buf()),
            entries: entries.into_iter().collect(),
        }
    }

    /// Creates an index that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Offset for `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Points `key` at `offset`, replacing any previous offset.
    pub fn set(&mut self, key: Value, offset: u64) {
        self.entries.insert(key, offset);
    }

    /// Drops `key`, returning its offset.
    pub fn remove(&mut self, key: &Value) -> Option<u64> {
        self.entries.remove(key)
    }

    /// Returns true if `key` is indexed.
    #[must_use]
    pub fn contains(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.keys().cloned().collect()
    }

    /// Iterates `(key, offset)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, u64)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rewrites the index file with the full mapping. No-op in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the file write fails.
    pub fn save(&self) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let entries: Vec<(&Value, &u64)> = self.entries.iter().collect();
        persistence::save(IndexKind::Primary, path, &entries)
    }
}
