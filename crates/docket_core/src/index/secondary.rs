//! Secondary field index.

use crate::error::CoreResult;
use crate::index::persistence::{self, IndexKind};
use docket_codec::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps values of one document field to the offsets of active records
/// holding that value.
///
/// Offsets within an entry keep insertion order and are never duplicated.
/// An entry whose offset set becomes empty is dropped.
#[derive(Debug)]
pub struct SecondaryIndex {
    field: String,
    path: Option<PathBuf>,
    entries: BTreeMap<Value, Vec<u64>>,
}

impl SecondaryIndex {
    /// Opens the index for `field` persisted at `path`.
    #[must_use]
    pub fn open(field: impl Into<String>, path: &Path) -> Self {
        let entries: Vec<(Value, Vec<u64>)> =
            persistence::load_or_default(IndexKind::Secondary, path);
        Self {
            field: field.into(),
            path: Some(path.to_path_buf()),
            entries: entries.into_iter().collect(),
        }
    }

    /// Creates an index for `field` that is never written to disk.
    #[must_use]
    pub fn in_memory(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            path: None,
            entries: BTreeMap::new(),
        }
    }

    /// Indexed field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Adds `offset` under `value` unless it is already there.
    pub fn add(&mut self, value: Value, offset: u64) {
        let offsets = self.entries.entry(value).or_default();
        if !offsets.contains(&offset) {
            offsets.push(offset);
        }
    }

    /// Removes `offset` from `value`'s set, dropping the entry when empty.
    pub fn remove_value(&mut self, value: &Value, offset: u64) {
        if let Some(offsets) = self.entries.get_mut(value) {
            offsets.retain(|&o| o != offset);
            if offsets.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// Removes `offset` from every entry. Returns true if any entry held it.
    pub fn remove_offset(&mut self, offset: u64) -> bool {
        let mut found = false;
        self.entries.retain(|_, offsets| {
            let before = offsets.len();
            offsets.retain(|&o| o != offset);
            found |= offsets.len() != before;
            !offsets.is_empty()
        });
        found
    }

    /// Offsets recorded for `value`.
    #[must_use]
    pub fn get(&self, value: &Value) -> &[u64] {
        self.entries.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates `(value, offsets)` in value order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &[u64])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of distinct values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no values are indexed.
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
        let entries: Vec<(&Value, &Vec<u64>)> = self.entries.iter().collect();
        persistence::save(IndexKind::Secondary, path, &entries)
    }
}
