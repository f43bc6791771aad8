//! Transaction manager.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::table::Table;
use crate::transaction::state::{Operation, OperationKind, Transaction, TransactionState};
use crate::types::TransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Looks up tables by name during compensation.
///
/// The manager never holds tables itself; whoever owns them (normally the
/// [`Database`](crate::Database)) passes a resolver to `rollback` and `undo`.
pub trait TableResolver {
    /// Returns the open table called `name`.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if there is no such table.
    fn resolve_table(&self, name: &str) -> CoreResult<Arc<Table>>;
}

/// Tracks active transactions and replays compensations on rollback.
///
/// Transaction ids are handed out from a counter and never reused. Once a
/// transaction commits or rolls back, its log is dropped and only its final
/// state is remembered, so that late calls fail with a precise reason.
#[derive(Debug)]
pub struct TransactionManager {
    next_txid: AtomicU64,
    active: RwLock<HashMap<TransactionId, Transaction>>,
    finished: RwLock<HashMap<TransactionId, TransactionState>>,
    clock: Arc<dyn Clock>,
}

impl TransactionManager {
    /// Creates a new transaction manager.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_txid: AtomicU64::new(1),
            active: RwLock::new(HashMap::new()),
            finished: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> TransactionId {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.active
            .write()
            .insert(id, Transaction::new(id, self.clock.now()));
        debug!(%id, "transaction started");
        id
    }

    /// Commits a transaction.
    ///
    /// Every effect is already in the tables; this only ends tracking.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or not active.
    pub fn commit(&self, id: TransactionId) -> CoreResult<()> {
        let mut txn = self.take_active(id)?;
        txn.mark_committed();
        self.finished.write().insert(id, txn.state());
        info!(%id, operations = txn.operations().len(), "transaction committed");
        Ok(())
    }

    /// Rolls back a transaction by applying the inverse of each recorded
    /// operation, newest first.
    ///
    /// The transaction is terminated even if a compensation fails; the
    /// first failure is returned and later compensations are not attempted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or not active, or the
    /// error of the failing compensation.
    pub fn rollback(&self, id: TransactionId, resolver: &dyn TableResolver) -> CoreResult<()> {
        let mut txn = self.take_active(id)?;
        let operations = txn.mark_rolled_back();
        self.finished.write().insert(id, txn.state());

        info!(%id, operations = operations.len(), "rolling back transaction");
        self.undo(&operations, resolver)
    }

    /// Marks the current position of the transaction log under `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or not active.
    pub fn create_savepoint(&self, id: TransactionId, name: &str) -> CoreResult<()> {
        self.with_active(id, |txn| txn.create_savepoint(name))
    }

    /// Truncates the log back to savepoint `name` and returns the removed
    /// operations, oldest first.
    ///
    /// Tables are not touched; pass the result to [`undo`](Self::undo) to
    /// compensate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or not active, and
    /// `MissingSavepoint` if `name` was never created.
    pub fn rollback_to_savepoint(&self, id: TransactionId, name: &str) -> CoreResult<Vec<Operation>> {
        self.with_active(id, |txn| txn.rollback_to_savepoint(name))
    }

    /// Truncates the log back to savepoint `name` and compensates the
    /// removed operations. Returns how many were undone.
    ///
    /// If a compensation fails, the operations it did not reach (the
    /// failing one included) go back into the transaction log, so a later
    /// [`rollback`](Self::rollback) still undoes them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction`, `MissingSavepoint`, or the error of
    /// the failing compensation.
    pub fn undo_to_savepoint(
        &self,
        id: TransactionId,
        name: &str,
        resolver: &dyn TableResolver,
    ) -> CoreResult<usize> {
        let mut operations = self.rollback_to_savepoint(id, name)?;
        let count = operations.len();
        match self.compensate(&operations, resolver) {
            Ok(()) => Ok(count),
            Err((pending, err)) => {
                operations.truncate(pending);
                if let Err(restore_err) = self.with_active(id, |txn| txn.restore(operations)) {
                    warn!(%id, error = %restore_err, "cannot restore uncompensated operations");
                }
                Err(err)
            }
        }
    }

    /// Applies the inverse of `operations` in reverse order, untracked.
    ///
    /// - Insert: delete the inserted key
    /// - Delete: re-insert the original document
    /// - Update: replace the record with the original document
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failing compensation.
    pub fn undo(&self, operations: &[Operation], resolver: &dyn TableResolver) -> CoreResult<()> {
        self.compensate(operations, resolver).map_err(|(_, err)| err)
    }

    /// On failure, also returns how many operations from the front were
    /// not compensated.
    fn compensate(
        &self,
        operations: &[Operation],
        resolver: &dyn TableResolver,
    ) -> Result<(), (usize, CoreError)> {
        for (i, op) in operations.iter().enumerate().rev() {
            Self::compensate_one(op, resolver).map_err(|err| (i + 1, err))?;
        }
        Ok(())
    }

    fn compensate_one(op: &Operation, resolver: &dyn TableResolver) -> CoreResult<()> {
        let table = resolver.resolve_table(&op.table)?;
        match (op.kind, &op.original) {
            (OperationKind::Insert, _) => table.delete(&op.key, None)?,
            (OperationKind::Delete, Some(original)) => {
                table.insert(original.clone(), None)?;
            }
            (OperationKind::Update, Some(original)) => {
                table.replace(&op.key, original.clone())?;
            }
            (kind, None) => {
                debug!(table = %op.table, key = %op.key, ?kind, "no original document, skipping");
            }
        }
        Ok(())
    }

    /// Appends `operation` to transaction `id` if it is active.
    ///
    /// Returns false when the id is unknown or terminated; the caller's
    /// operation then proceeds untracked.
    pub fn record(&self, id: TransactionId, operation: Operation) -> bool {
        self.active
            .write()
            .get_mut(&id)
            .is_some_and(|txn| txn.record(operation).is_ok())
    }

    /// Returns true if `id` is an active transaction.
    pub fn is_active(&self, id: TransactionId) -> bool {
        self.active.read().contains_key(&id)
    }

    /// State of `id`, or `None` if it was never begun.
    pub fn state(&self, id: TransactionId) -> Option<TransactionState> {
        if self.is_active(id) {
            return Some(TransactionState::Active);
        }
        self.finished.read().get(&id).copied()
    }

    /// Snapshot of the operations recorded so far.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransaction` if `id` is unknown or not active.
    pub fn operations(&self, id: TransactionId) -> CoreResult<Vec<Operation>> {
        self.active
            .read()
            .get(&id)
            .map(|txn| txn.operations().to_vec())
            .ok_or_else(|| self.not_active(id))
    }

    /// Number of active transactions.
    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Ids of active transactions, ascending.
    pub fn active_ids(&self) -> Vec<TransactionId> {
        let mut ids: Vec<_> = self.active.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn take_active(&self, id: TransactionId) -> CoreResult<Transaction> {
        self.active
            .write()
            .remove(&id)
            .ok_or_else(|| self.not_active(id))
    }

    fn with_active<T>(
        &self,
        id: TransactionId,
        f: impl FnOnce(&mut Transaction) -> CoreResult<T>,
    ) -> CoreResult<T> {
        match self.active.write().get_mut(&id) {
            Some(txn) => f(txn),
            None => Err(self.not_active(id)),
        }
    }

    fn not_active(&self, id: TransactionId) -> CoreError {
        let reason = match self.finished.read().get(&id) {
            Some(TransactionState::Committed) => "already committed",
            Some(TransactionState::RolledBack) => "already rolled back",
            Some(TransactionState::Active) | None => "unknown transaction",
        };
        CoreError::invalid_transaction(id, reason)
    }
}
