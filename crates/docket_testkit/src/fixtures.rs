//! Test fixtures and database helpers.
//!
//! Every fixture database runs on a [`ManualClock`], so version timestamps
//! are deterministic and time-travel reads can be asserted exactly.

use docket_codec::{doc, Value};
use docket_core::{Clock, Config, CoreError, CoreResult, Database, ManualClock, Timestamp};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Clock reading every fixture database starts at.
pub const START_TIME: f64 = 1_000.0;

/// A file-backed test database with a manual clock and automatic cleanup.
pub struct TestDatabase {
    db: Option<Database>,
    clock: Arc<ManualClock>,
    config: Config,
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Creates a database in a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a database with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(START_TIME)));
        let db = open(temp_dir.path(), config.clone(), &clock);
        Self {
            db: Some(db),
            clock,
            config,
            temp_dir,
        }
    }

    /// The database.
    pub fn db(&self) -> &Database {
        self.db.as_ref().expect("database is open")
    }

    /// The clock every timestamp comes from.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Moves the clock forward and returns the new reading.
    pub fn advance(&self, secs: f64) -> Timestamp {
        self.clock.advance(secs);
        self.clock.now()
    }

    /// Database directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the database and opens it again from disk, keeping the clock.
    pub fn reopen(&mut self) {
        drop(self.db.take());
        self.db = Some(open(self.temp_dir.path(), self.config.clone(), &self.clock));
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        self.db()
    }
}

fn open(path: &Path, config: Config, clock: &Arc<ManualClock>) -> Database {
    let clock: Arc<dyn Clock> = Arc::clone(clock) as Arc<dyn Clock>;
    Database::open_with_clock(path, config, clock).expect("Failed to open test database")
}

/// Runs a test with a temporary database.
///
/// ```rust
/// use docket_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     let users = db.create_table("users", "id", &[]).unwrap();
///     assert!(users.is_empty());
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase) -> R,
{
    let test_db = TestDatabase::new();
    f(&test_db)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use docket_core::TransactionId;

    /// Creates a `products` table with a secondary index on `category`.
    pub fn products(db: &Database) -> Arc<docket_core::Table> {
        db.create_table("products", "id", &["category"])
            .expect("Failed to create products table")
    }

    /// Creates an `accounts` table holding A (1000) and B (500), inserted
    /// in one committed transaction.
    pub fn bank(db: &Database) -> Arc<docket_core::Table> {
        let accounts = db
            .create_table("accounts", "id", &["owner"])
            .expect("Failed to create accounts table");
        db.transaction(|tx| {
            accounts.insert(doc! { "id" => "A", "owner" => "alice", "balance" => 1000 }, Some(tx))?;
            accounts.insert(doc! { "id" => "B", "owner" => "bob", "balance" => 500 }, Some(tx))?;
            Ok(())
        })
        .expect("Failed to seed accounts");
        accounts
    }

    /// Current balance of an account.
    pub fn balance(db: &Database, account: &str) -> Option<i64> {
        db.table("accounts")
            .ok()?
            .get(&Value::from(account))?
            .get("balance")?
            .as_integer()
    }

    /// Moves `amount` between two accounts under `tx`.
    ///
    /// The debit is applied before the balance check, so a failed transfer
    /// leaves a partial write behind for the caller to roll back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the source balance would go negative.
    pub fn transfer(db: &Database, tx: TransactionId, from: &str, to: &str, amount: i64) -> CoreResult<()> {
        let accounts = db.table("accounts")?;
        let from_balance = balance(db, from).ok_or_else(|| CoreError::not_found("accounts", Value::from(from)))?;
        let to_balance = balance(db, to).ok_or_else(|| CoreError::not_found("accounts", Value::from(to)))?;

        accounts.update(&Value::from(from), doc! { "balance" => from_balance - amount }, Some(tx))?;
        if from_balance < amount {
            return Err(CoreError::invalid_operation(format!(
                "insufficient funds in {from}: {from_balance} < {amount}"
            )));
        }
        accounts.update(&Value::from(to), doc! { "balance" => to_balance + amount }, Some(tx))?;
        Ok(())
    }
}
