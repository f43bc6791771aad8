//! History and point-in-time commands.

use super::{open_existing, parse_key, CommandResult};
use docket_core::Timestamp;
use std::path::Path;

/// Prints every archived version of a key, oldest first.
pub fn run_history(path: &Path, table: &str, key: &str) -> CommandResult {
    let db = open_existing(path)?;
    db.table(table)?;
    let key = parse_key(key);

    let history = db.versions().history(table, &key);
    if history.is_empty() {
        println!("No history for {table}/{key}");
        return Ok(());
    }
    for (i, entry) in history.iter().enumerate() {
        println!("#{} at {}: {}", i + 1, entry.timestamp, entry.data.to_json()?);
    }
    Ok(())
}

/// Prints a key as it was at `timestamp`.
pub fn run_at(path: &Path, table: &str, key: &str, timestamp: f64) -> CommandResult {
    let db = open_existing(path)?;
    db.table(table)?;
    let key = parse_key(key);

    match db.versions().at(table, &key, Timestamp::from_secs(timestamp)) {
        Some(doc) => println!("{}", doc.to_json_pretty()?),
        None => println!("{table}/{key} did not exist at {timestamp}"),
    }
    Ok(())
}
