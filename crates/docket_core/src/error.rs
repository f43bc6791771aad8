//! Error types for Docket core.

use docket_codec::Value;
use std::io;
use thiserror::Error;

use crate::types::TransactionId;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Docket core operations.
///
/// Corrupt or truncated records are never reported here; the record log
/// folds them into "absent".
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docket_storage::StorageError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docket_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Insert with a primary key that is already indexed.
    #[error("duplicate key {key} in table {table}")]
    DuplicateKey {
        /// Table name.
        table: String,
        /// The conflicting key.
        key: Value,
    },

    /// The primary index has no entry for the key.
    #[error("key {key} not found in table {table}")]
    NotFound {
        /// Table name.
        table: String,
        /// The missing key.
        key: Value,
    },

    /// The primary index points at a record that no longer reads as active.
    #[error("key {key} in table {table} points at a deleted record")]
    Deleted {
        /// Table name.
        table: String,
        /// The key whose record is gone.
        key: Value,
    },

    /// Unknown transaction id, or the transaction is no longer active.
    #[error("invalid transaction {id}: {reason}")]
    InvalidTransaction {
        /// The transaction id.
        id: TransactionId,
        /// Why the transaction cannot be used.
        reason: String,
    },

    /// No savepoint with this name exists in the transaction.
    #[error("savepoint {name:?} not found in {id}")]
    MissingSavepoint {
        /// The transaction id.
        id: TransactionId,
        /// The savepoint name.
        name: String,
    },

    /// Table does not exist.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// Table already exists.
    #[error("table already exists: {name}")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// A table or field name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid name {name:?}: only letters, digits, '_' and '-' are allowed")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Unknown query operator token.
    #[error("unsupported query operator: {token}")]
    UnsupportedOperator {
        /// The rejected token.
        token: String,
    },

    /// Database is already open or locked.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Invalid database format or layout.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid transaction error.
    pub fn invalid_transaction(id: TransactionId, reason: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            id,
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>, key: Value) -> Self {
        Self::NotFound {
            table: table.into(),
            key,
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }
}
