//! Change feed for observing inserted documents.
//!
//! The change feed is the in-process side of peer broadcast: it receives
//! every insert through [`WriteListener`] and fans it out to subscribers.
//! Delivery is fire-and-forget; a dropped receiver is simply forgotten.
//!
//! # Usage
//!
//! ```rust,no_run
//! use docket_codec::doc;
//! use docket_core::Database;
//!
//! let db = Database::open("my_db".as_ref())?;
//! let users = db.create_table("users", "id", &[])?;
//!
//! let receiver = db.subscribe();
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{}: {}", event.table, event.key);
//!     }
//! });
//!
//! users.insert(doc! { "id" => "u1" }, None)?;
//! # Ok::<(), docket_core::CoreError>(())
//! ```

use crate::notify::WriteListener;
use docket_codec::{Document, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// A single change event from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Position in the feed, starting at 1.
    pub sequence: u64,
    /// Table the document was inserted into.
    pub table: String,
    /// Primary key of the document.
    pub key: Value,
    /// The stored document.
    pub document: Document,
}

/// A change feed that distributes inserts to subscribers.
///
/// - Preserves emission order
/// - Supports multiple subscribers
/// - Keeps a bounded history for polling
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: Mutex<VecDeque<ChangeEvent>>,
    next_sequence: Mutex<u64>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            next_sequence: Mutex::new(1),
            max_history,
        }
    }

    /// Subscribes to the change feed.
    ///
    /// The receiver gets every event emitted after this call.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Assigns the next sequence number and delivers the event.
    pub fn emit(&self, table: &str, key: &Value, document: &Document) -> u64 {
        let event = {
            let mut next = self.next_sequence.lock();
            let event = ChangeEvent {
                sequence: *next,
                table: table.to_string(),
                key: key.clone(),
                document: document.clone(),
            };
            *next += 1;

            let mut history = self.history.lock();
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
            event
        };

        let sequence = event.sequence;
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
        sequence
    }

    /// Events with sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence of the newest event, 0 if none was emitted.
    pub fn latest_sequence(&self) -> u64 {
        *self.next_sequence.lock() - 1
    }

    /// Number of connected subscribers, as of the last emit.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of events retained for polling.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("latest_sequence", &self.latest_sequence())
            .field("max_history", &self.max_history)
            .finish_non_exhaustive()
    }
}

impl WriteListener for ChangeFeed {
    fn on_write(&self, table: &str, key: &Value, document: &Document) {
        self.emit(table, key, document);
    }
}
