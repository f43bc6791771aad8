//! Database statistics.
//!
//! [`DatabaseStats`] observes every table operation through
//! [`QueryObserver`] and keeps global counters plus per-table counters with
//! a moving average of latency. The database facade adds transaction
//! counters.
//!
//! # Usage
//!
//! ```rust,no_run
//! use docket_core::Database;
//!
//! let db = Database::open("my_db".as_ref())?;
//! // Perform operations...
//!
//! let stats = db.stats().snapshot();
//! println!("Reads: {}", stats.reads);
//! println!("Writes: {}", stats.writes);
//! println!("Transactions: {}", stats.transactions_committed);
//! # Ok::<(), docket_core::CoreError>(())
//! ```

use crate::notify::{QueryKind, QueryObserver};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Weight of the previous average in the latency moving average.
const LATENCY_DECAY: f64 = 0.9;

/// Counters for one table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TableStats {
    /// Point reads.
    pub reads: u64,
    /// Inserts, updates and deletes.
    pub writes: u64,
    /// Full-scan queries.
    pub scans: u64,
    /// Exponential moving average of operation latency, in milliseconds.
    pub avg_latency_ms: f64,
}

impl TableStats {
    fn record(&mut self, kind: QueryKind, elapsed: Duration) {
        match kind {
            QueryKind::Read => self.reads += 1,
            QueryKind::Write => self.writes += 1,
            QueryKind::Scan => self.scans += 1,
        }
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.avg_latency_ms = LATENCY_DECAY * self.avg_latency_ms + (1.0 - LATENCY_DECAY) * sample;
    }

    /// Total operations of every kind.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.reads + self.writes + self.scans
    }
}

/// Database statistics and metrics.
///
/// Global counters are atomic and can be read while operations are in
/// progress.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    scans: AtomicU64,

    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,

    tables: RwLock<BTreeMap<String, TableStats>>,
}

impl DatabaseStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of point reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the total number of writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the total number of full scans.
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Returns the total number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the total number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the total number of transactions rolled back.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Counters for one table, if it has seen any operation.
    pub fn table(&self, name: &str) -> Option<TableStats> {
        self.tables.read().get(name).copied()
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            scans: self.scans(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_rolled_back: self.transactions_rolled_back(),
            tables: self.tables.read().clone(),
        }
    }
}

impl QueryObserver for DatabaseStats {
    fn on_query(&self, table: &str, kind: QueryKind, elapsed: Duration) {
        let counter = match kind {
            QueryKind::Read => &self.reads,
            QueryKind::Write => &self.writes,
            QueryKind::Scan => &self.scans,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut tables = self.tables.write();
        tables
            .entry(table.to_string())
            .or_default()
            .record(kind, elapsed);
    }
}

/// A point-in-time snapshot of database statistics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsSnapshot {
    /// Total number of point reads.
    pub reads: u64,
    /// Total number of writes.
    pub writes: u64,
    /// Total number of full scans.
    pub scans: u64,
    /// Total number of transactions started.
    pub transactions_started: u64,
    /// Total number of transactions committed.
    pub transactions_committed: u64,
    /// Total number of transactions rolled back.
    pub transactions_rolled_back: u64,
    /// Per-table counters, by table name.
    pub tables: BTreeMap<String, TableStats>,
}
