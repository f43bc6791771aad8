//! Database configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Primary key field used by `create_table` callers that pass none.
    pub default_primary_key: String,

    /// Whether to fsync the record log after every append (safer but slower).
    pub sync_writes: bool,

    /// Number of change events the change feed retains for polling.
    pub change_feed_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            default_primary_key: "id".to_string(),
            sync_writes: false,
            change_feed_history: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the default primary key field name.
    #[must_use]
    pub fn default_primary_key(mut self, field: impl Into<String>) -> Self {
        self.default_primary_key = field.into();
        self
    }

    /// Sets whether to sync the record log on every write.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets how many change events are kept for polling.
    #[must_use]
    pub const fn change_feed_history(mut self, events: usize) -> Self {
        self.change_feed_history = events;
        self
    }
}
