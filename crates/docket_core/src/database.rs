//! Database facade.

use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::notify::Collaborators;
use crate::stats::DatabaseStats;
use crate::table::{validate_name, Table, TableContext, TableMeta};
use crate::transaction::{TableResolver, TransactionManager};
use crate::types::TransactionId;
use crate::version::VersionArchive;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{info, warn};

/// The main database handle.
///
/// A database is a directory of tables sharing one transaction manager, one
/// version archive, a change feed and statistics. Tables are opened lazily
/// and cached; every handle to the same table is the same [`Arc<Table>`].
///
/// # Opening a Database
///
/// ```rust,no_run
/// use docket_codec::{doc, Value};
/// use docket_core::Database;
///
/// let db = Database::open("bank_db".as_ref())?;
/// let accounts = db.create_table("accounts", "id", &["owner"])?;
///
/// let tx = db.begin();
/// accounts.insert(doc! { "id" => "A", "balance" => 1000 }, Some(tx))?;
/// accounts.insert(doc! { "id" => "B", "balance" => 500 }, Some(tx))?;
/// db.commit(tx)?;
///
/// assert_eq!(accounts.get(&Value::from("A")).unwrap().get("balance"), Some(&Value::Integer(1000)));
/// # Ok::<(), docket_core::CoreError>(())
/// ```
pub struct Database {
    config: Config,
    dir: DatabaseDir,
    clock: Arc<dyn Clock>,
    transactions: Arc<TransactionManager>,
    versions: Arc<VersionArchive>,
    change_feed: Arc<ChangeFeed>,
    stats: Arc<DatabaseStats>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Opens or creates a database with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseLocked` if another process holds the directory, or
    /// an I/O error.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database with custom configuration.
    ///
    /// ```rust,no_run
    /// use docket_core::{Config, Database};
    ///
    /// let config = Config::default()
    ///     .create_if_missing(false)
    ///     .sync_writes(true);
    ///
    /// let db = Database::open_with_config("my_db".as_ref(), config)?;
    /// # Ok::<(), docket_core::CoreError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// See [`Database::open`]; also fails when the directory is missing and
    /// `create_if_missing` is false, or holds tables and `error_if_exists`
    /// is true.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock))
    }

    /// Opens a database whose timestamps come from `clock`.
    ///
    /// # Errors
    ///
    /// See [`Database::open_with_config`].
    pub fn open_with_clock(path: &Path, config: Config, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing, config.error_if_exists)?;
        let versions = Arc::new(VersionArchive::open(&dir.history_dir(), Arc::clone(&clock))?);
        let transactions = Arc::new(TransactionManager::new(Arc::clone(&clock)));
        let change_feed = Arc::new(ChangeFeed::with_max_history(config.change_feed_history));

        info!(path = %path.display(), "database opened");
        Ok(Self {
            config,
            dir,
            clock,
            transactions,
            versions,
            change_feed,
            stats: Arc::new(DatabaseStats::new()),
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a table with primary key field `pk` and a secondary index on
    /// each of `indexes`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a bad table or field name, `TableExists` if
    /// the table is already on disk, or an I/O error.
    pub fn create_table(&self, name: &str, pk: &str, indexes: &[&str]) -> CoreResult<Arc<Table>> {
        validate_name(name)?;
        let mut tables = self.tables.write();
        if tables.contains_key(name) || self.dir.table_exists(name) {
            return Err(CoreError::TableExists {
                name: name.to_string(),
            });
        }

        let meta = TableMeta::new(pk, indexes.iter().copied());
        let table = Arc::new(Table::create(&self.dir.table_dir(name), name, meta, self.context())?);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Opens `name`, creating it with the configured default primary key if
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// As [`Database::create_table`] and [`Database::table`].
    pub fn open_or_create_table(&self, name: &str, indexes: &[&str]) -> CoreResult<Arc<Table>> {
        match self.table(name) {
            Err(CoreError::TableNotFound { .. }) => {
                let pk = self.config.default_primary_key.clone();
                self.create_table(name, &pk, indexes)
            }
            other => other,
        }
    }

    /// Returns a loaded table, or opens it from disk.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if no such table exists.
    pub fn table(&self, name: &str) -> CoreResult<Arc<Table>> {
        if let Some(table) = self.tables.read().get(name) {
            return Ok(Arc::clone(table));
        }

        validate_name(name).map_err(|_| CoreError::table_not_found(name))?;
        let mut tables = self.tables.write();
        if let Some(table) = tables.get(name) {
            return Ok(Arc::clone(table));
        }
        if !self.dir.table_exists(name) {
            return Err(CoreError::table_not_found(name));
        }
        let table = Arc::new(Table::open(&self.dir.table_dir(name), name, self.context())?);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Names of all tables on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables directory cannot be listed.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        self.dir.table_names()
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> TransactionId {
        self.stats.record_transaction_start();
        self.transactions.begin()
    }

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or finished.
    pub fn commit(&self, id: TransactionId) -> CoreResult<()> {
        self.transactions.commit(id)?;
        self.stats.record_transaction_commit();
        Ok(())
    }

    /// Rolls back a transaction, compensating every operation it recorded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or finished, or the
    /// first compensation failure.
    pub fn rollback(&self, id: TransactionId) -> CoreResult<()> {
        let was_active = self.transactions.is_active(id);
        let result = self.transactions.rollback(id, self);
        if was_active {
            self.stats.record_transaction_rollback();
        }
        result
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back if it returns `Err`. The
    /// error of `f` is returned even if the rollback itself fails.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of the commit.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(TransactionId) -> CoreResult<T>,
    {
        let id = self.begin();
        match f(id) {
            Ok(value) => {
                self.commit(id)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback(id) {
                    warn!(%id, error = %rollback_err, "rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    /// Marks a savepoint in an active transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is not active.
    pub fn create_savepoint(&self, id: TransactionId, name: &str) -> CoreResult<()> {
        self.transactions.create_savepoint(id, name)
    }

    /// Compensates every operation recorded after savepoint `name`. The
    /// transaction stays active. Returns the number of operations undone.
    ///
    /// Operations a failed compensation did not reach stay in the
    /// transaction, so a later [`rollback`](Self::rollback) undoes them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction`, `MissingSavepoint`, or the first
    /// compensation failure.
    pub fn rollback_to_savepoint(&self, id: TransactionId, name: &str) -> CoreResult<usize> {
        self.transactions.undo_to_savepoint(id, name, self)
    }

    /// Transaction manager shared by all tables.
    #[must_use]
    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    /// Version archive shared by all tables.
    #[must_use]
    pub fn versions(&self) -> &Arc<VersionArchive> {
        &self.versions
    }

    /// Operation statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<DatabaseStats> {
        &self.stats
    }

    /// Change feed of inserted documents.
    #[must_use]
    pub fn change_feed(&self) -> &Arc<ChangeFeed> {
        &self.change_feed
    }

    /// Subscribes to inserts across all tables.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.change_feed.subscribe()
    }

    /// Database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Time source used for transaction and version timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn context(&self) -> TableContext {
        let feed: Arc<ChangeFeed> = Arc::clone(&self.change_feed);
        let stats: Arc<DatabaseStats> = Arc::clone(&self.stats);
        let collaborators = Collaborators::none()
            .with_write_listener(feed)
            .with_query_observer(stats);
        TableContext::new(
            Arc::clone(&self.transactions),
            Arc::clone(&self.versions),
            Arc::clone(&self.clock),
        )
        .with_collaborators(collaborators)
        .sync_writes(self.config.sync_writes)
    }
}

impl TableResolver for Database {
    fn resolve_table(&self, name: &str) -> CoreResult<Arc<Table>> {
        self.table(name)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.dir.path())
            .field("config", &self.config)
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transaction::TransactionState;
    use crate::types::Timestamp;
    use docket_codec::{doc, Value};
    use tempfile::tempdir;

    fn balance(table: &Table, key: &str) -> Option<i64> {
        table
            .get(&Value::from(key))
            .and_then(|d| d.get("balance").and_then(Value::as_integer))
    }

    #[test]
    fn create_then_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let users = db.create_table("users", "id", &["city"]).unwrap();
            users.insert(doc! { "id" => "u1", "city" => "Oslo" }, None).unwrap();
            assert!(Arc::ptr_eq(&users, &db.table("users").unwrap()));
        }

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.table_names().unwrap(), ["users"]);
        let users = db.table("users").unwrap();
        assert_eq!(users.meta().pk, "id");
        assert!(users.get(&Value::from("u1")).is_some());
    }

    #[test]
    fn table_errors() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        db.create_table("users", "id", &[]).unwrap();

        assert!(matches!(db.create_table("users", "id", &[]), Err(CoreError::TableExists { .. })));
        assert!(matches!(db.table("ghosts"), Err(CoreError::TableNotFound { .. })));
        assert!(matches!(db.table("../etc"), Err(CoreError::TableNotFound { .. })));
        assert!(matches!(db.create_table("bad name", "id", &[]), Err(CoreError::InvalidName { .. })));
    }

    #[test]
    fn open_or_create_uses_default_key() {
        let dir = tempdir().unwrap();
        let db = Database::open_with_config(dir.path(), Config::default().default_primary_key("sku")).unwrap();
        let items = db.open_or_create_table("items", &[]).unwrap();
        assert_eq!(items.meta().pk, "sku");
        assert!(Arc::ptr_eq(&items, &db.open_or_create_table("items", &[]).unwrap()));
    }

    #[test]
    fn rollback_restores_prior_state() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let accounts = db.create_table("accounts", "id", &[]).unwrap();
        accounts.insert(doc! { "id" => "A", "balance" => 1000 }, None).unwrap();
        accounts.insert(doc! { "id" => "B", "balance" => 500 }, None).unwrap();

        let tx = db.begin();
        accounts.update(&Value::from("A"), doc! { "balance" => 0, "frozen" => true }, Some(tx)).unwrap();
        accounts.delete(&Value::from("B"), Some(tx)).unwrap();
        accounts.insert(doc! { "id" => "C", "balance" => 1 }, Some(tx)).unwrap();
        db.rollback(tx).unwrap();

        assert_eq!(accounts.get(&Value::from("A")), Some(doc! { "id" => "A", "balance" => 1000 }));
        assert_eq!(balance(&accounts, "B"), Some(500));
        assert_eq!(accounts.get(&Value::from("C")), None);
        assert_eq!(db.transactions().state(tx), Some(TransactionState::RolledBack));
        assert_eq!(db.stats().transactions_rolled_back(), 1);
        assert!(db.rollback(tx).is_err());
        assert_eq!(db.stats().transactions_rolled_back(), 1);
    }

    #[test]
    fn savepoint_undoes_tail_only() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let t = db.create_table("t", "id", &[]).unwrap();

        let tx = db.begin();
        t.insert(doc! { "id" => 1 }, Some(tx)).unwrap();
        db.create_savepoint(tx, "after_first").unwrap();
        t.insert(doc! { "id" => 2 }, Some(tx)).unwrap();
        t.insert(doc! { "id" => 3 }, Some(tx)).unwrap();

        assert_eq!(db.rollback_to_savepoint(tx, "after_first").unwrap(), 2);
        assert_eq!(t.keys(), vec![Value::Integer(1)]);
        assert!(db.transactions().is_active(tx));
        assert!(matches!(
            db.rollback_to_savepoint(tx, "nope"),
            Err(CoreError::MissingSavepoint { .. })
        ));
        db.commit(tx).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn failed_savepoint_rollback_leaves_work_for_rollback() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let t = db.create_table("t", "id", &[]).unwrap();
        t.insert(doc! { "id" => 1, "v" => "orig" }, None).unwrap();

        let tx = db.begin();
        db.create_savepoint(tx, "sp").unwrap();
        t.delete(&Value::Integer(1), Some(tx)).unwrap();
        t.insert(doc! { "id" => 2 }, Some(tx)).unwrap();
        t.insert(doc! { "id" => 1, "v" => "other" }, None).unwrap();

        assert!(matches!(
            db.rollback_to_savepoint(tx, "sp"),
            Err(CoreError::DuplicateKey { .. })
        ));
        assert_eq!(db.transactions().operations(tx).unwrap().len(), 1);

        t.delete(&Value::Integer(1), None).unwrap();
        db.rollback(tx).unwrap();
        assert_eq!(t.get(&Value::Integer(1)), Some(doc! { "id" => 1, "v" => "orig" }));
        assert_eq!(t.get(&Value::Integer(2)), None);
    }

    #[test]
    fn transaction_helper_rolls_back_on_error() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let accounts = db.create_table("accounts", "id", &[]).unwrap();

        db.transaction(|tx| {
            accounts.insert(doc! { "id" => "A", "balance" => 100 }, Some(tx))?;
            Ok(())
        })
        .unwrap();

        let result: CoreResult<()> = db.transaction(|tx| {
            accounts.update(&Value::from("A"), doc! { "balance" => -50 }, Some(tx))?;
            Err(CoreError::invalid_operation("insufficient funds"))
        });
        assert!(result.is_err());
        assert_eq!(balance(&accounts, "A"), Some(100));
        assert_eq!(db.stats().transactions_committed(), 1);
        assert_eq!(db.stats().transactions_rolled_back(), 1);
    }

    #[test]
    fn inserts_reach_change_feed_and_stats() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let rx = db.subscribe();
        let t = db.create_table("t", "id", &[]).unwrap();

        t.insert(doc! { "id" => "k" }, None).unwrap();
        t.update(&Value::from("k"), doc! { "n" => 1 }, None).unwrap();
        t.get(&Value::from("k"));
        t.query().execute();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.table, "t");
        assert_eq!(event.key, Value::from("k"));
        assert!(rx.try_recv().is_err());

        assert_eq!(db.stats().writes(), 2);
        assert_eq!(db.stats().reads(), 1);
        assert_eq!(db.stats().scans(), 1);
        assert_eq!(db.stats().table("t").unwrap().total(), 4);
    }

    #[test]
    fn versions_use_injected_clock() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000.0)));
        let db = Database::open_with_clock(dir.path(), Config::default(), clock.clone()).unwrap();
        let t = db.create_table("t", "id", &[]).unwrap();

        t.insert(doc! { "id" => "k", "v" => 1 }, None).unwrap();
        clock.advance(10.0);
        t.update(&Value::from("k"), doc! { "v" => 2 }, None).unwrap();

        let history = db.versions().history("t", &Value::from("k"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].timestamp, Timestamp::from_secs(1_010.0));
        let at = db.versions().at("t", &Value::from("k"), Timestamp::from_secs(1_005.0)).unwrap();
        assert_eq!(at.get("v"), Some(&Value::Integer(1)));
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _db = Database::open(dir.path()).unwrap();
        assert!(matches!(Database::open(dir.path()), Err(CoreError::DatabaseLocked)));
    }
}
