//! # Docket Core
//!
//! Embedded document database engine for Docket.
//!
//! This crate provides:
//! - Append-only record logs with in-place tombstoning
//! - Primary and secondary indexes persisted as whole files
//! - Tables with insert, get, update, delete and full-scan queries
//! - Compensating transactions with savepoints
//! - A per-record version archive for time-travel reads
//! - A change feed and operation statistics

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod clock;
mod config;
mod database;
mod dir;
mod error;
mod index;
mod log;
mod notify;
mod query;
mod stats;
mod table;
mod transaction;
mod types;
mod version;

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use change_feed::{ChangeEvent, ChangeFeed};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::Database;
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult};
pub use index::{IndexKind, PrimaryIndex, SecondaryIndex};
pub use log::{LogEntry, RecordHeader, RecordLog, RecordStatus};
pub use notify::{Collaborators, QueryKind, QueryObserver, WriteListener};
pub use query::{Filter, Operator, Query};
pub use stats::{DatabaseStats, StatsSnapshot, TableStats};
pub use table::{validate_name, SecondaryEntry, Table, TableContext, TableMeta, VerifyReport};
pub use transaction::{
    Operation, OperationKind, TableResolver, Transaction, TransactionManager, TransactionState,
};
pub use types::{Timestamp, TransactionId};
pub use version::{VersionArchive, VersionEntry};
