//! CLI command implementations.

pub mod dump_log;
pub mod get;
pub mod history;
pub mod inspect;
pub mod verify;

use docket_codec::{parse_value, Value};
use docket_core::{Config, Database};
use std::path::Path;

/// Result type shared by every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens an existing database; never creates one.
pub fn open_existing(path: &Path) -> CommandResult<Database> {
    let config = Config::default().create_if_missing(false);
    Ok(Database::open_with_config(path, config)?)
}

/// Parses a command-line key as JSON, falling back to plain text so that
/// `P1` and `"P1"` name the same key while `42` is an integer.
pub fn parse_key(raw: &str) -> Value {
    parse_value(raw).unwrap_or_else(|_| Value::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_as_json_then_text() {
        assert_eq!(parse_key("42"), Value::Integer(42));
        assert_eq!(parse_key("\"42\""), Value::from("42"));
        assert_eq!(parse_key("P1"), Value::from("P1"));
        assert_eq!(parse_key("[1, 2]"), Value::from(vec![1, 2]));
    }
}
