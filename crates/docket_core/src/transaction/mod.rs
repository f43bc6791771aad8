//! Compensating transactions.
//!
//! A transaction records every table operation issued under its id. Table
//! calls take effect immediately, so there is no isolation: other readers
//! see uncommitted writes as soon as they happen. Commit stops tracking;
//! rollback replays inverse operations against the tables, newest first.

mod manager;
mod state;

pub use manager::{TableResolver, TransactionManager};
pub use state::{Operation, OperationKind, Transaction, TransactionState};
