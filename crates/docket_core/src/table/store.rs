//! Table: record log, indexes and version history kept in step.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::index::{PrimaryIndex, SecondaryIndex};
use crate::log::{LogEntry, RecordLog};
use crate::notify::{Collaborators, QueryKind};
use crate::query::Query;
use crate::table::meta::{validate_name, TableMeta};
use crate::transaction::{Operation, TransactionManager};
use crate::types::TransactionId;
use crate::version::VersionArchive;
use docket_codec::{Document, Value};
use docket_storage::{FileBackend, InMemoryBackend};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Metadata file inside a table directory.
pub const META_FILE: &str = "meta.json";
/// Record log file inside a table directory.
pub const DATA_FILE: &str = "data.bin";
/// Primary index file inside a table directory.
pub const PRIMARY_INDEX_FILE: &str = "pk.idx";
/// Directory holding one `<field>.idx` file per secondary index.
pub const SECONDARY_INDEX_DIR: &str = "idx";

/// Shared services every table of a database is wired to.
#[derive(Debug, Clone)]
pub struct TableContext {
    pub(crate) transactions: Arc<TransactionManager>,
    pub(crate) versions: Arc<VersionArchive>,
    pub(crate) collaborators: Collaborators,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sync_writes: bool,
}

impl TableContext {
    /// Creates a context with no collaborators and unsynced writes.
    pub fn new(
        transactions: Arc<TransactionManager>,
        versions: Arc<VersionArchive>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transactions,
            versions,
            collaborators: Collaborators::none(),
            clock,
            sync_writes: false,
        }
    }

    /// Sets the collaborators notified by tables.
    #[must_use]
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Sets whether record logs sync after every write.
    #[must_use]
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }
}

/// Primary and secondary indexes of one table, guarded together.
#[derive(Debug)]
pub(super) struct Indexes {
    pub(super) primary: PrimaryIndex,
    /// One per `TableMeta::indexes` entry, same order.
    pub(super) secondary: Vec<SecondaryIndex>,
}

impl Indexes {
    fn add_secondary(&mut self, doc: &Document, offset: u64, touched: &mut Vec<usize>) {
        for (i, index) in self.secondary.iter_mut().enumerate() {
            if let Some(value) = doc.get(index.field()) {
                index.add(value.clone(), offset);
                touched.push(i);
            }
        }
    }

    /// Drops `offset` from the secondary indexes. Without the document the
    /// offset is searched for in every entry.
    fn remove_secondary(&mut self, doc: Option<&Document>, offset: u64, touched: &mut Vec<usize>) {
        for (i, index) in self.secondary.iter_mut().enumerate() {
            match doc {
                Some(doc) => {
                    if let Some(value) = doc.get(index.field()) {
                        index.remove_value(value, offset);
                        touched.push(i);
                    }
                }
                None => {
                    if index.remove_offset(offset) {
                        touched.push(i);
                    }
                }
            }
        }
    }

    /// Saves the primary index and every touched secondary index.
    fn save(&self, touched: &[usize]) -> CoreResult<()> {
        self.primary.save()?;
        for (i, index) in self.secondary.iter().enumerate() {
            if touched.contains(&i) {
                index.save()?;
            }
        }
        Ok(())
    }

    pub(super) fn save_all(&self) -> CoreResult<()> {
        self.primary.save()?;
        for index in &self.secondary {
            index.save()?;
        }
        Ok(())
    }
}

/// A named collection of documents with a primary key and optional
/// secondary indexes.
///
/// Every mutation runs its steps in a fixed order: transaction log, record
/// log, indexes, index files, version history, notifications. There is no
/// cross-file atomicity; a crash between steps can leave them disagreeing,
/// which [`verify`](Table::verify) detects and
/// [`rebuild_indexes`](Table::rebuild_indexes) repairs.
///
/// # Example
///
/// ```rust,no_run
/// use docket_codec::{doc, Value};
/// use docket_core::Database;
///
/// let db = Database::open("shop_db".as_ref())?;
/// let products = db.create_table("products", "id", &["category"])?;
///
/// products.insert(doc! { "id" => "P1", "price" => 1200, "category" => "laptops" }, None)?;
/// products.update(&Value::from("P1"), doc! { "price" => 1100 }, None)?;
///
/// let p1 = products.get(&Value::from("P1")).unwrap();
/// assert_eq!(p1.get("price"), Some(&Value::Integer(1100)));
/// # Ok::<(), docket_core::CoreError>(())
/// ```
pub struct Table {
    pub(super) name: String,
    pub(super) meta: TableMeta,
    pub(super) log: RecordLog,
    pub(super) indexes: Mutex<Indexes>,
    pub(super) ctx: TableContext,
}

impl Table {
    /// Creates a table directory and writes its metadata.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a bad table or index field name,
    /// `TableExists` if `dir` already holds a table, or an I/O error.
    pub fn create(dir: &Path, name: &str, meta: TableMeta, ctx: TableContext) -> CoreResult<Self> {
        validate_name(name)?;
        for field in &meta.indexes {
            validate_name(field)?;
        }

        let meta_path = dir.join(META_FILE);
        if meta_path.exists() {
            return Err(CoreError::TableExists {
                name: name.to_string(),
            });
        }
        fs::create_dir_all(dir)?;
        meta.save(&meta_path)?;
        info!(table = name, pk = %meta.pk, indexes = ?meta.indexes, "table created");

        Self::open(dir, name, ctx)
    }

    /// Opens an existing table directory.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if there is no metadata file, `InvalidFormat`
    /// if it does not parse, or an I/O error.
    pub fn open(dir: &Path, name: &str, ctx: TableContext) -> CoreResult<Self> {
        let meta = TableMeta::load(&dir.join(META_FILE))?
            .ok_or_else(|| CoreError::table_not_found(name))?;

        let backend = FileBackend::open_with_create_dirs(&dir.join(DATA_FILE))?;
        let log = RecordLog::with_sync(Box::new(backend), ctx.sync_writes);

        let index_dir = dir.join(SECONDARY_INDEX_DIR);
        fs::create_dir_all(&index_dir)?;
        let indexes = Indexes {
            primary: PrimaryIndex::open(&dir.join(PRIMARY_INDEX_FILE)),
            secondary: meta
                .indexes
                .iter()
                .map(|field| SecondaryIndex::open(field.as_str(), &index_dir.join(format!("{field}.idx"))))
                .collect(),
        };

        Ok(Self {
            name: name.to_string(),
            meta,
            log,
            indexes: Mutex::new(indexes),
            ctx,
        })
    }

    /// Creates a table whose log and indexes live only in memory. Version
    /// history still goes to the context's archive.
    pub fn in_memory(name: &str, meta: TableMeta, ctx: TableContext) -> Self {
        let indexes = Indexes {
            primary: PrimaryIndex::in_memory(),
            secondary: meta
                .indexes
                .iter()
                .map(|field| SecondaryIndex::in_memory(field.as_str()))
                .collect(),
        };
        Self {
            name: name.to_string(),
            log: RecordLog::new(Box::new(InMemoryBackend::new())),
            meta,
            indexes: Mutex::new(indexes),
            ctx,
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary key field and indexed fields.
    #[must_use]
    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// Inserts a document and returns it as stored.
    ///
    /// A missing primary key field gets a fresh UUID string.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the key is already indexed (nothing is
    /// changed), or the error of a failing write.
    pub fn insert(&self, mut doc: Document, tx: Option<TransactionId>) -> CoreResult<Document> {
        let started = Instant::now();
        let key = match doc.get(&self.meta.pk) {
            Some(key) => key.clone(),
            None => {
                let key = Value::Text(Uuid::new_v4().to_string());
                doc.insert(self.meta.pk.as_str(), key.clone());
                key
            }
        };

        {
            let mut indexes = self.indexes.lock();
            if indexes.primary.contains(&key) {
                return Err(CoreError::DuplicateKey {
                    table: self.name.clone(),
                    key,
                });
            }
            let record = RecordLog::encode(&doc)?;
            self.track(tx, || {
                Operation::insert(&self.name, key.clone(), doc.clone(), self.ctx.clock.now())
            });

            let offset = self.log.append(&record)?;
            indexes.primary.set(key.clone(), offset);
            let mut touched = Vec::new();
            indexes.add_secondary(&doc, offset, &mut touched);
            indexes.save(&touched)?;

            self.ctx.versions.archive(&self.name, &key, &doc, None)?;
        }

        self.ctx.collaborators.notify_write(&self.name, &key, &doc);
        self.report(QueryKind::Write, started);
        Ok(doc)
    }

    /// Current document for `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Document> {
        let started = Instant::now();
        let doc = {
            let indexes = self.indexes.lock();
            indexes.primary.get(key).and_then(|offset| self.log.read(offset))
        };
        self.report(QueryKind::Read, started);
        doc
    }

    /// Merges `patch` into the document at `key` and returns the result.
    ///
    /// The old revision is tombstoned and the merged document is written as
    /// a new one. Inserts notify write listeners; updates do not.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if `patch` changes the primary key
    /// - `NotFound` if `key` is not indexed
    /// - `Deleted` if the indexed record no longer reads back
    pub fn update(&self, key: &Value, patch: Document, tx: Option<TransactionId>) -> CoreResult<Document> {
        let started = Instant::now();
        if let Some(new_key) = patch.get(&self.meta.pk) {
            if new_key != key {
                return Err(CoreError::invalid_operation(format!(
                    "update may not change primary key {} of {key} to {new_key}",
                    self.meta.pk
                )));
            }
        }

        let merged = {
            let mut indexes = self.indexes.lock();
            let (offset, existing) = self.current(&indexes, key)?;
            let merged = existing.merged(&patch);
            let record = RecordLog::encode(&merged)?;
            self.track(tx, || {
                Operation::update(
                    &self.name,
                    key.clone(),
                    patch.clone(),
                    existing.clone(),
                    self.ctx.clock.now(),
                )
            });

            self.rewrite(&mut indexes, key, offset, &existing, &merged, &record)?;
            merged
        };

        self.report(QueryKind::Write, started);
        Ok(merged)
    }

    /// Replaces the document at `key` wholesale. Used to undo updates, so
    /// it is never tracked.
    pub(crate) fn replace(&self, key: &Value, doc: Document) -> CoreResult<Document> {
        let started = Instant::now();
        {
            let mut indexes = self.indexes.lock();
            let (offset, existing) = self.current(&indexes, key)?;
            let record = RecordLog::encode(&doc)?;
            self.rewrite(&mut indexes, key, offset, &existing, &doc, &record)?;
        }
        self.report(QueryKind::Write, started);
        Ok(doc)
    }

    /// Deletes the document at `key`. Absent keys are a no-op.
    ///
    /// No version is archived; the history keeps the last state before the
    /// delete.
    ///
    /// # Errors
    ///
    /// Returns an error if an index file cannot be saved.
    pub fn delete(&self, key: &Value, tx: Option<TransactionId>) -> CoreResult<()> {
        let started = Instant::now();
        {
            let mut indexes = self.indexes.lock();
            let Some(offset) = indexes.primary.get(key) else {
                return Ok(());
            };
            let existing = self.log.read(offset);
            self.track(tx, || {
                Operation::delete(&self.name, key.clone(), existing.clone(), self.ctx.clock.now())
            });

            self.log.tombstone(offset);
            indexes.primary.remove(key);
            let mut touched = Vec::new();
            indexes.remove_secondary(existing.as_ref(), offset, &mut touched);
            indexes.save(&touched)?;
        }
        self.report(QueryKind::Write, started);
        Ok(())
    }

    /// Starts a full-scan query.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Snapshot of the primary keys, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.indexes.lock().primary.keys()
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.lock().primary.len()
    }

    /// Returns true if no keys are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.lock().primary.is_empty()
    }

    /// Record log offset of the current revision of `key`.
    #[must_use]
    pub fn offset_of(&self, key: &Value) -> Option<u64> {
        self.indexes.lock().primary.get(key)
    }

    /// Reads the record at `offset`, bypassing the indexes.
    #[must_use]
    pub fn read_at(&self, offset: u64) -> Option<Document> {
        self.log.read(offset)
    }

    /// Offsets the secondary index on `field` holds for `value`, or `None`
    /// if `field` is not indexed.
    #[must_use]
    pub fn lookup(&self, field: &str, value: &Value) -> Option<Vec<u64>> {
        let indexes = self.indexes.lock();
        indexes
            .secondary
            .iter()
            .find(|index| index.field() == field)
            .map(|index| index.get(value).to_vec())
    }

    /// Every record in the log, in write order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn scan_log(&self) -> CoreResult<Vec<LogEntry>> {
        self.log.scan()
    }

    /// Size of the record log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Current documents of every indexed key, in key order.
    pub(crate) fn live_documents(&self) -> Vec<Document> {
        let indexes = self.indexes.lock();
        indexes
            .primary
            .iter()
            .filter_map(|(_, offset)| self.log.read(offset))
            .collect()
    }

    pub(crate) fn report(&self, kind: QueryKind, started: Instant) {
        self.ctx
            .collaborators
            .notify_query(&self.name, kind, started.elapsed());
    }

    fn current(&self, indexes: &Indexes, key: &Value) -> CoreResult<(u64, Document)> {
        let offset = indexes
            .primary
            .get(key)
            .ok_or_else(|| CoreError::not_found(&self.name, key.clone()))?;
        let doc = self.log.read(offset).ok_or_else(|| CoreError::Deleted {
            table: self.name.clone(),
            key: key.clone(),
        })?;
        Ok((offset, doc))
    }

    /// Supersedes the revision at `old_offset` with `new`, already encoded
    /// as `record`.
    fn rewrite(
        &self,
        indexes: &mut Indexes,
        key: &Value,
        old_offset: u64,
        old: &Document,
        new: &Document,
        record: &[u8],
    ) -> CoreResult<()> {
        self.log.tombstone(old_offset);
        let mut touched = Vec::new();
        indexes.remove_secondary(Some(old), old_offset, &mut touched);

        let offset = self.log.append(record)?;
        indexes.primary.set(key.clone(), offset);
        indexes.add_secondary(new, offset, &mut touched);
        indexes.save(&touched)?;

        self.ctx.versions.archive(&self.name, key, new, None)?;
        Ok(())
    }

    fn track(&self, tx: Option<TransactionId>, operation: impl FnOnce() -> Operation) {
        if let Some(id) = tx {
            if !self.ctx.transactions.record(id, operation()) {
                warn!(table = %self.name, %id, "transaction is not active, operation not tracked");
            }
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::WriteListener;
    use crate::types::Timestamp;
    use docket_codec::doc;
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<Value>>);

    impl WriteListener for Recorder {
        fn on_write(&self, _table: &str, key: &Value, _document: &Document) {
            self.0.lock().push(key.clone());
        }
    }

    fn context(dir: &TempDir) -> (TableContext, Arc<Recorder>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Timestamp::from_secs(100.0)));
        let versions = Arc::new(VersionArchive::open(&dir.path().join("history"), clock.clone()).unwrap());
        let recorder = Arc::new(Recorder::default());
        let ctx = TableContext::new(Arc::new(TransactionManager::new(clock.clone())), versions, clock)
            .with_collaborators(Collaborators::none().with_write_listener(recorder.clone()));
        (ctx, recorder)
    }

    fn products(dir: &TempDir) -> (Table, Arc<Recorder>) {
        let (ctx, recorder) = context(dir);
        let meta = TableMeta::new("id", ["category"]);
        (Table::in_memory("products", meta, ctx), recorder)
    }

    #[test]
    fn insert_then_get() {
        let dir = tempdir().unwrap();
        let (table, recorder) = products(&dir);
        let stored = table
            .insert(doc! { "id" => "P1", "price" => 1200, "category" => "laptops" }, None)
            .unwrap();

        assert_eq!(table.get(&Value::from("P1")), Some(stored));
        assert_eq!(table.len(), 1);
        assert_eq!(*recorder.0.lock(), vec![Value::from("P1")]);
        assert_eq!(table.lookup("category", &Value::from("laptops")).unwrap().len(), 1);
        assert_eq!(table.lookup("price", &Value::Integer(1200)), None);
    }

    #[test]
    fn missing_key_gets_uuid() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        let stored = table.insert(doc! { "name" => "Mouse" }, None).unwrap();

        let key = stored.get("id").and_then(Value::as_text).unwrap();
        assert_eq!(key.len(), 36);
        assert!(table.get(&Value::from(key)).is_some());
    }

    #[test]
    fn duplicate_key_changes_nothing() {
        let dir = tempdir().unwrap();
        let (table, recorder) = products(&dir);
        table.insert(doc! { "id" => "P1", "price" => 1 }, None).unwrap();
        let size = table.log.size().unwrap();

        let err = table.insert(doc! { "id" => "P1", "price" => 2 }, None).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        assert_eq!(table.log.size().unwrap(), size);
        assert_eq!(recorder.0.lock().len(), 1);
        assert_eq!(table.get(&Value::from("P1")).unwrap().get("price"), Some(&Value::Integer(1)));
    }

    #[test]
    fn integer_and_text_keys_are_distinct() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        table.insert(doc! { "id" => 1 }, None).unwrap();
        table.insert(doc! { "id" => "1" }, None).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn update_merges_and_moves_index() {
        let dir = tempdir().unwrap();
        let (table, recorder) = products(&dir);
        table
            .insert(doc! { "id" => "P1", "price" => 1200, "category" => "laptops" }, None)
            .unwrap();
        let first = table.offset_of(&Value::from("P1")).unwrap();

        let merged = table
            .update(&Value::from("P1"), doc! { "category" => "ultrabooks" }, None)
            .unwrap();
        assert_eq!(merged.get("price"), Some(&Value::Integer(1200)));

        let second = table.offset_of(&Value::from("P1")).unwrap();
        assert!(second > first);
        assert_eq!(table.read_at(first), None);
        assert!(table.lookup("category", &Value::from("laptops")).unwrap().is_empty());
        assert_eq!(table.lookup("category", &Value::from("ultrabooks")).unwrap(), vec![second]);
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn update_errors() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        table.insert(doc! { "id" => "P1" }, None).unwrap();

        assert!(matches!(
            table.update(&Value::from("P9"), doc! { "x" => 1 }, None),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            table.update(&Value::from("P1"), doc! { "id" => "P2" }, None),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert!(table.update(&Value::from("P1"), doc! { "id" => "P1", "x" => 1 }, None).is_ok());
    }

    #[test]
    fn non_finite_floats_are_rejected_before_any_write() {
        let dir = tempdir().unwrap();
        let (table, recorder) = products(&dir);
        let tx = table.ctx.transactions.begin();

        for bad in [f64::NAN, f64::INFINITY] {
            let err = table
                .insert(doc! { "id" => "P1", "category" => bad }, Some(tx))
                .unwrap_err();
            assert!(matches!(err, CoreError::Codec(_)));
        }
        assert!(table.is_empty());
        assert_eq!(table.log.size().unwrap(), 0);
        assert!(table.lookup("category", &Value::Float(f64::INFINITY)).unwrap().is_empty());
        assert!(recorder.0.lock().is_empty());

        table.insert(doc! { "id" => "P1", "category" => "mice" }, Some(tx)).unwrap();
        let offset = table.offset_of(&Value::from("P1")).unwrap();
        let size = table.log.size().unwrap();

        for bad in [f64::NAN, f64::INFINITY] {
            let err = table
                .update(&Value::from("P1"), doc! { "category" => bad }, Some(tx))
                .unwrap_err();
            assert!(matches!(err, CoreError::Codec(_)));
        }
        assert_eq!(table.offset_of(&Value::from("P1")), Some(offset));
        assert_eq!(table.log.size().unwrap(), size);
        assert_eq!(table.lookup("category", &Value::from("mice")).unwrap(), vec![offset]);
        assert!(table.verify().unwrap().is_consistent());
        assert_eq!(table.ctx.transactions.operations(tx).unwrap().len(), 1);
        assert_eq!(table.ctx.versions.history("products", &Value::from("P1")).len(), 1);
    }

    #[test]
    fn update_of_tombstoned_record_is_deleted() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        table.insert(doc! { "id" => "P1" }, None).unwrap();
        let offset = table.offset_of(&Value::from("P1")).unwrap();
        table.log.tombstone(offset);

        assert!(matches!(
            table.update(&Value::from("P1"), doc! { "x" => 1 }, None),
            Err(CoreError::Deleted { .. })
        ));
        assert_eq!(table.get(&Value::from("P1")), None);
    }

    #[test]
    fn delete_removes_everything_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        table.insert(doc! { "id" => "P1", "category" => "laptops" }, None).unwrap();
        let offset = table.offset_of(&Value::from("P1")).unwrap();

        table.delete(&Value::from("P1"), None).unwrap();
        table.delete(&Value::from("P1"), None).unwrap();

        assert_eq!(table.get(&Value::from("P1")), None);
        assert_eq!(table.read_at(offset), None);
        assert!(table.lookup("category", &Value::from("laptops")).unwrap().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn operations_are_tracked_in_transaction() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        let tx = table.ctx.transactions.begin();

        table.insert(doc! { "id" => "P1", "price" => 1 }, Some(tx)).unwrap();
        table.update(&Value::from("P1"), doc! { "price" => 2 }, Some(tx)).unwrap();
        table.delete(&Value::from("P1"), Some(tx)).unwrap();

        let ops = table.ctx.transactions.operations(tx).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1].original, Some(doc! { "id" => "P1", "price" => 1 }));
        assert_eq!(ops[2].original, Some(doc! { "id" => "P1", "price" => 2 }));
    }

    #[test]
    fn untracked_when_transaction_finished() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        let tx = table.ctx.transactions.begin();
        table.ctx.transactions.commit(tx).unwrap();

        table.insert(doc! { "id" => "P1" }, Some(tx)).unwrap();
        assert!(table.get(&Value::from("P1")).is_some());
    }

    #[test]
    fn writes_archive_versions() {
        let dir = tempdir().unwrap();
        let (table, _) = products(&dir);
        table.insert(doc! { "id" => "P1", "price" => 1 }, None).unwrap();
        table.update(&Value::from("P1"), doc! { "price" => 2 }, None).unwrap();
        table.delete(&Value::from("P1"), None).unwrap();

        let history = table.ctx.versions.history("products", &Value::from("P1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].data.get("price"), Some(&Value::Integer(2)));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("tables").join("products");
        {
            let (ctx, _) = context(&dir);
            let table = Table::create(&table_dir, "products", TableMeta::new("id", ["category"]), ctx).unwrap();
            table.insert(doc! { "id" => "P1", "category" => "laptops" }, None).unwrap();
            table.insert(doc! { "id" => "P2", "category" => "phones" }, None).unwrap();
            table.delete(&Value::from("P2"), None).unwrap();
        }
        assert!(table_dir.join(META_FILE).exists());
        assert!(table_dir.join(SECONDARY_INDEX_DIR).join("category.idx").exists());

        let (ctx, _) = context(&dir);
        let table = Table::open(&table_dir, "products", ctx).unwrap();
        assert_eq!(table.keys(), vec![Value::from("P1")]);
        assert_eq!(table.lookup("category", &Value::from("laptops")).unwrap().len(), 1);
        assert_eq!(table.meta().indexes, vec!["category".to_string()]);
    }

    #[test]
    fn create_rejects_existing_and_bad_names() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("t");
        let (ctx, _) = context(&dir);
        Table::create(&table_dir, "t", TableMeta::new("id", Vec::<String>::new()), ctx.clone()).unwrap();

        assert!(matches!(
            Table::create(&table_dir, "t", TableMeta::new("id", Vec::<String>::new()), ctx.clone()),
            Err(CoreError::TableExists { .. })
        ));
        assert!(matches!(
            Table::create(&dir.path().join("u"), "u", TableMeta::new("id", ["a/b"]), ctx.clone()),
            Err(CoreError::InvalidName { .. })
        ));
        assert!(matches!(
            Table::open(&dir.path().join("missing"), "missing", ctx),
            Err(CoreError::TableNotFound { .. })
        ));
    }
}
