//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::types::{Timestamp, TransactionId};
use docket_codec::{Document, Value};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and records operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// Kind of a recorded table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A document was inserted.
    Insert,
    /// A document was patched.
    Update,
    /// A document was deleted.
    Delete,
}

/// One table operation recorded under a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Table the operation ran against.
    pub table: String,
    /// Primary key of the affected record.
    pub key: Value,
    /// What happened.
    pub kind: OperationKind,
    /// Inserted document, or the patch of an update.
    pub data: Option<Document>,
    /// Full document before an update or delete.
    pub original: Option<Document>,
    /// When the operation was recorded.
    pub timestamp: Timestamp,
}

impl Operation {
    /// An insert of `document`.
    #[must_use]
    pub fn insert(table: &str, key: Value, document: Document, timestamp: Timestamp) -> Self {
        Self {
            table: table.to_string(),
            key,
            kind: OperationKind::Insert,
            data: Some(document),
            original: None,
            timestamp,
        }
    }

    /// An update applying `patch` over `original`.
    #[must_use]
    pub fn update(
        table: &str,
        key: Value,
        patch: Document,
        original: Document,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            table: table.to_string(),
            key,
            kind: OperationKind::Update,
            data: Some(patch),
            original: Some(original),
            timestamp,
        }
    }

    /// A delete of `original`. `None` when the record no longer read back
    /// at delete time, in which case there is nothing to restore.
    #[must_use]
    pub fn delete(
        table: &str,
        key: Value,
        original: Option<Document>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            table: table.to_string(),
            key,
            kind: OperationKind::Delete,
            data: None,
            original,
            timestamp,
        }
    }
}

/// A transaction's operation log and savepoints.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    started_at: Timestamp,
    operations: Vec<Operation>,
    /// Savepoint name to operation-log length, in creation order.
    savepoints: Vec<(String, usize)>,
}

impl Transaction {
    /// Creates a new active transaction.
    pub(crate) fn new(id: TransactionId, started_at: Timestamp) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            started_at,
            operations: Vec::new(),
            savepoints: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// When `begin` created the transaction.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Recorded operations, oldest first.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Savepoint names in creation order.
    pub fn savepoints(&self) -> impl Iterator<Item = &str> {
        self.savepoints.iter().map(|(name, _)| name.as_str())
    }

    /// Appends an operation.
    pub(crate) fn record(&mut self, operation: Operation) -> CoreResult<()> {
        self.ensure_active()?;
        self.operations.push(operation);
        Ok(())
    }

    /// Marks the current log length under `name`, replacing an older
    /// savepoint of the same name.
    pub(crate) fn create_savepoint(&mut self, name: &str) -> CoreResult<()> {
        self.ensure_active()?;
        self.savepoints.retain(|(n, _)| n != name);
        self.savepoints.push((name.to_string(), self.operations.len()));
        Ok(())
    }

    /// Cuts the log back to savepoint `name` and returns the removed
    /// operations, oldest first. Savepoints created after the cut are
    /// dropped; `name` itself survives.
    pub(crate) fn rollback_to_savepoint(&mut self, name: &str) -> CoreResult<Vec<Operation>> {
        self.ensure_active()?;
        let Some(&(_, position)) = self.savepoints.iter().find(|(n, _)| n == name) else {
            return Err(CoreError::MissingSavepoint {
                id: self.id,
                name: name.to_string(),
            });
        };
        let undone = self.operations.split_off(position);
        self.savepoints.retain(|&(_, p)| p <= position);
        Ok(undone)
    }

    /// Puts operations back at the end of the log, e.g. ones a failed
    /// compensation never reached.
    pub(crate) fn restore(&mut self, operations: Vec<Operation>) -> CoreResult<()> {
        self.ensure_active()?;
        self.operations.extend(operations);
        Ok(())
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    /// Marks the transaction as rolled back and hands over its log.
    pub(crate) fn mark_rolled_back(&mut self) -> Vec<Operation> {
        self.state = TransactionState::RolledBack;
        self.savepoints.clear();
        std::mem::take(&mut self.operations)
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => {
                Err(CoreError::invalid_transaction(self.id, "already committed"))
            }
            TransactionState::RolledBack => {
                Err(CoreError::invalid_transaction(self.id, "already rolled back"))
            }
        }
    }
}
