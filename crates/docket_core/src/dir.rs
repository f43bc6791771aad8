//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ tables/<name>/    # One directory per table
//! └─ history/          # Version archive files
//! ```
//!
//! The LOCK file ensures only one process can open the database at a time.

use crate::error::{CoreError, CoreResult};
use crate::table::META_FILE;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const TABLES_DIR: &str = "tables";
const HISTORY_DIR: &str = "history";

/// Manages the database directory structure and file locking.
///
/// Holds an exclusive lock on the directory for its whole lifetime; the lock
/// is released when the value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - It already holds tables and `error_if_exists` is true
    /// - Another process holds the lock (`DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool, error_if_exists: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        let dir = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };
        if error_if_exists && !dir.table_names()?.is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "database already exists: {}",
                path.display()
            )));
        }

        fs::create_dir_all(dir.tables_dir())?;
        fs::create_dir_all(dir.history_dir())?;
        Ok(dir)
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parent of every table directory.
    #[must_use]
    pub fn tables_dir(&self) -> PathBuf {
        self.path.join(TABLES_DIR)
    }

    /// Directory of one table.
    #[must_use]
    pub fn table_dir(&self, name: &str) -> PathBuf {
        self.tables_dir().join(name)
    }

    /// Version archive directory.
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.path.join(HISTORY_DIR)
    }

    /// Returns true if `name` has a metadata file on disk.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.table_dir(name).join(META_FILE).is_file()
    }

    /// Names of the tables on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables directory cannot be listed.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        let tables_dir = self.tables_dir();
        if !tables_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&tables_dir)? {
            let entry = entry?;
            if !entry.path().join(META_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
