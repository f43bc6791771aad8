//! Tables.
//!
//! Each table lives in its own directory:
//!
//! ```text
//! tables/<name>/
//! ├── meta.json        primary key field and indexed fields
//! ├── data.bin         record log
//! ├── pk.idx           primary index
//! └── idx/<field>.idx  one secondary index per indexed field
//! ```

mod meta;
mod store;
mod verify;

pub use meta::{validate_name, TableMeta};
pub use store::{Table, TableContext, DATA_FILE, META_FILE, PRIMARY_INDEX_FILE, SECONDARY_INDEX_DIR};
pub use verify::{SecondaryEntry, VerifyReport};
