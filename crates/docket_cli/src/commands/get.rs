//! Get command implementation.

use super::{open_existing, parse_key, CommandResult};
use std::path::Path;

/// Runs the get command.
pub fn run(path: &Path, table: &str, key: &str) -> CommandResult {
    let db = open_existing(path)?;
    let key = parse_key(key);

    match db.table(table)?.get(&key) {
        Some(doc) => println!("{}", doc.to_json_pretty()?),
        None => return Err(format!("{table}: no document for key {key}").into()),
    }
    Ok(())
}
