//! Consistency checks between a table's record log and its indexes.

use crate::error::CoreResult;
use crate::table::store::Table;
use docket_codec::{Document, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// A secondary index entry that disagrees with the record log.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryEntry {
    /// Indexed field.
    pub field: String,
    /// Indexed value.
    pub value: Value,
    /// Record offset.
    pub offset: u64,
}

/// Result of [`Table::verify`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
    /// Table name.
    pub table: String,
    /// Records found in the log, superseded and deleted ones included.
    pub records: usize,
    /// Active records whose payload decodes.
    pub live_records: usize,
    /// Keys in the primary index.
    pub indexed_keys: usize,
    /// Primary keys whose offset does not read back a document.
    pub dangling_primary: Vec<Value>,
    /// Offsets of live records no primary key points at.
    pub orphaned_records: Vec<u64>,
    /// Secondary entries pointing at a record that lacks the value.
    pub dangling_secondary: Vec<SecondaryEntry>,
    /// Indexed field values of current records missing from their index.
    pub missing_secondary: Vec<SecondaryEntry>,
}

impl VerifyReport {
    /// Returns true if no problem was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.dangling_primary.is_empty()
            && self.orphaned_records.is_empty()
            && self.dangling_secondary.is_empty()
            && self.missing_secondary.is_empty()
    }
}

impl Table {
    /// Cross-checks the indexes against the record log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let indexes = self.indexes.lock();
        let entries = self.log.scan()?;

        let mut report = VerifyReport {
            table: self.name.clone(),
            records: entries.len(),
            live_records: entries.iter().filter(|e| e.is_live()).count(),
            indexed_keys: indexes.primary.len(),
            ..VerifyReport::default()
        };

        let mut current: BTreeMap<u64, Document> = BTreeMap::new();
        for (key, offset) in indexes.primary.iter() {
            match self.log.read(offset) {
                Some(doc) => {
                    current.insert(offset, doc);
                }
                None => report.dangling_primary.push(key.clone()),
            }
        }

        report.orphaned_records = entries
            .iter()
            .filter(|e| e.is_live() && !current.contains_key(&e.offset))
            .map(|e| e.offset)
            .collect();

        for index in &indexes.secondary {
            let field = index.field();
            let mut seen: HashSet<u64> = HashSet::new();
            for (value, offsets) in index.iter() {
                for &offset in offsets {
                    let matches = current
                        .get(&offset)
                        .and_then(|doc| doc.get(field))
                        .is_some_and(|v| v == value);
                    if matches {
                        seen.insert(offset);
                    } else {
                        report.dangling_secondary.push(SecondaryEntry {
                            field: field.to_string(),
                            value: value.clone(),
                            offset,
                        });
                    }
                }
            }
            for (&offset, doc) in &current {
                if let Some(value) = doc.get(field) {
                    if !seen.contains(&offset) {
                        report.missing_secondary.push(SecondaryEntry {
                            field: field.to_string(),
                            value: value.clone(),
                            offset,
                        });
                    }
                }
            }
        }

        if !report.is_consistent() {
            warn!(
                table = %self.name,
                dangling_primary = report.dangling_primary.len(),
                orphaned = report.orphaned_records.len(),
                dangling_secondary = report.dangling_secondary.len(),
                missing_secondary = report.missing_secondary.len(),
                "table indexes disagree with record log"
            );
        }
        Ok(report)
    }

    /// Rebuilds every index from the live records of the log and saves them.
    ///
    /// When several live records share a key the later one wins. Records
    /// without a primary key field are skipped. Returns the number of keys
    /// indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or an index file cannot
    /// be written.
    pub fn rebuild_indexes(&self) -> CoreResult<usize> {
        let mut indexes = self.indexes.lock();
        let entries = self.log.scan()?;

        let mut latest: BTreeMap<Value, (u64, Document)> = BTreeMap::new();
        for entry in entries {
            if !entry.is_live() {
                continue;
            }
            let Some(doc) = entry.document else {
                continue;
            };
            match doc.get(&self.meta.pk) {
                Some(key) => {
                    latest.insert(key.clone(), (entry.offset, doc));
                }
                None => warn!(table = %self.name, offset = entry.offset, "record has no primary key, skipped"),
            }
        }

        indexes.primary.clear();
        for index in &mut indexes.secondary {
            index.clear();
        }
        for (key, (offset, doc)) in &latest {
            indexes.primary.set(key.clone(), *offset);
            for index in &mut indexes.secondary {
                if let Some(value) = doc.get(index.field()) {
                    index.add(value.clone(), *offset);
                }
            }
        }
        indexes.save_all()?;

        info!(table = %self.name, keys = latest.len(), "indexes rebuilt");
        Ok(latest.len())
    }
}
