//! One-way notification interfaces for collaborators outside the core.
//!
//! Tables call out through these after the fact. Listeners cannot fail the
//! operation that triggered them and their results are never consulted.

use docket_codec::{Document, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Category of a table operation reported to [`QueryObserver`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Point read by primary key.
    Read,
    /// Insert, update or delete.
    Write,
    /// Full-scan query.
    Scan,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Read => "read",
            QueryKind::Write => "write",
            QueryKind::Scan => "scan",
        })
    }
}

/// Receives documents after they are inserted.
pub trait WriteListener: Send + Sync {
    /// Called once per successful insert.
    fn on_write(&self, table: &str, key: &Value, document: &Document);
}

/// Receives timing for table operations.
pub trait QueryObserver: Send + Sync {
    /// Called after a read, write or scan completes.
    fn on_query(&self, table: &str, kind: QueryKind, elapsed: Duration);
}

/// The set of collaborators a table notifies.
///
/// Cheap to clone; every table of a database shares the same listeners.
#[derive(Clone, Default)]
pub struct Collaborators {
    write_listeners: Vec<Arc<dyn WriteListener>>,
    query_observers: Vec<Arc<dyn QueryObserver>>,
}

impl Collaborators {
    /// No collaborators.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds a write listener.
    #[must_use]
    pub fn with_write_listener(mut self, listener: Arc<dyn WriteListener>) -> Self {
        self.write_listeners.push(listener);
        self
    }

    /// Adds a query observer.
    #[must_use]
    pub fn with_query_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.query_observers.push(observer);
        self
    }

    pub(crate) fn notify_write(&self, table: &str, key: &Value, document: &Document) {
        for listener in &self.write_listeners {
            listener.on_write(table, key, document);
        }
    }

    pub(crate) fn notify_query(&self, table: &str, kind: QueryKind, elapsed: Duration) {
        for observer in &self.query_observers {
            observer.on_query(table, kind, elapsed);
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("write_listeners", &self.write_listeners.len())
            .field("query_observers", &self.query_observers.len())
            .finish()
    }
}
