//! Append-only record log.
//!
//! Each table keeps its documents in one log file. Records are never moved
//! or rewritten; a delete or a superseding update flips the status byte of
//! the old record in place.
//!
//! ## Record Format
//!
//! ```text
//! | status (1) | payload_len (4, LE) | payload (N, UTF-8 JSON) |
//! ```
//!
//! Status:
//! - `0x00` = active
//! - `0x01` = deleted (tombstone)
//!
//! There is no file header and no checksum. The end of the file is the end
//! of valid records.

mod record;
mod store;

pub use record::{RecordHeader, RecordStatus};
pub use store::{LogEntry, RecordLog};
