//! Model-based test harness.
//!
//! Applies [`TableOperation`]s to a real table and to an in-memory model at
//! the same time, then checks that the two agree and that the table's
//! indexes agree with its record log.

use crate::generators::TableOperation;
use docket_codec::{Document, Value};
use docket_core::{CoreError, Table, TransactionId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the secondary-indexed field the harness writes.
pub const TAG_FIELD: &str = "tag";

/// A table paired with the documents it is expected to hold.
pub struct ModelHarness {
    table: Arc<Table>,
    model: BTreeMap<Value, Document>,
}

impl ModelHarness {
    /// Wraps an empty table whose primary key is `id`.
    pub fn new(table: Arc<Table>) -> Self {
        assert!(table.is_empty(), "harness needs an empty table");
        Self {
            table,
            model: BTreeMap::new(),
        }
    }

    /// The table under test.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Expected documents by key.
    pub fn model(&self) -> &BTreeMap<Value, Document> {
        &self.model
    }

    /// Applies `op` to both the table and the model, asserting the table
    /// reports the outcome the model predicts.
    pub fn apply(&mut self, op: &TableOperation, tx: Option<TransactionId>) {
        match op {
            TableOperation::Insert { key, tag, body } => {
                let mut doc = with_tag(body, tag);
                doc.insert("id", key.clone());
                let result = self.table.insert(doc.clone(), tx);
                if self.model.contains_key(key) {
                    assert!(
                        matches!(result, Err(CoreError::DuplicateKey { .. })),
                        "insert of existing {key} should fail, got {result:?}"
                    );
                } else {
                    assert_eq!(result.expect("insert failed"), doc);
                    self.model.insert(key.clone(), doc);
                }
            }
            TableOperation::Update { key, tag, body } => {
                let patch = with_tag(body, tag);
                let result = self.table.update(key, patch.clone(), tx);
                match self.model.get_mut(key) {
                    Some(existing) => {
                        existing.merge(&patch);
                        assert_eq!(&result.expect("update failed"), existing);
                    }
                    None => assert!(
                        matches!(result, Err(CoreError::NotFound { .. })),
                        "update of missing {key} should fail, got {result:?}"
                    ),
                }
            }
            TableOperation::Delete { key } => {
                self.table.delete(key, tx).expect("delete failed");
                self.model.remove(key);
            }
        }
    }

    /// Asserts the table holds exactly the model's documents and its
    /// indexes agree with its record log.
    pub fn verify_all(&self) {
        assert_table_matches(&self.table, &self.model);
    }
}

/// Asserts `table` holds exactly `expected` and is internally consistent.
pub fn assert_table_matches(table: &Table, expected: &BTreeMap<Value, Document>) {
    let keys: Vec<Value> = expected.keys().cloned().collect();
    assert_eq!(table.keys(), keys, "primary index keys differ");

    for (key, doc) in expected {
        assert_eq!(table.get(key).as_ref(), Some(doc), "document mismatch for {key}");

        if let Some(tag) = doc.get(TAG_FIELD) {
            let offset = table.offset_of(key).expect("indexed key has an offset");
            let offsets = table.lookup(TAG_FIELD, tag).unwrap_or_default();
            assert!(offsets.contains(&offset), "{key} missing from tag index");
        }
    }

    let report = table.verify().expect("verify failed");
    assert!(report.is_consistent(), "inconsistent table: {report:?}");
}

/// Reads every current document of `table`.
pub fn snapshot(table: &Table) -> BTreeMap<Value, Document> {
    table
        .keys()
        .into_iter()
        .filter_map(|key| table.get(&key).map(|doc| (key, doc)))
        .collect()
}

fn with_tag(body: &Document, tag: &Option<Value>) -> Document {
    let mut doc = body.clone();
    if let Some(tag) = tag {
        doc.insert(TAG_FIELD, tag.clone());
    }
    doc
}
