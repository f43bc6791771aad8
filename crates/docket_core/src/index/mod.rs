//! Primary and secondary indexes.
//!
//! Both index kinds live fully in memory and are persisted by rewriting the
//! whole file on every [`save`](PrimaryIndex::save). A missing or unreadable
//! index file loads as an empty index; [`Table::rebuild_indexes`] is the
//! explicit way back to agreement with the record log.
//!
//! [`Table::rebuild_indexes`]: crate::Table::rebuild_indexes

mod persistence;
mod primary;
mod secondary;

pub use persistence::IndexKind;
pub use primary::PrimaryIndex;
pub use secondary::SecondaryIndex;
