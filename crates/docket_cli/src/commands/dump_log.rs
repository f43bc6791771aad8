//! Dump log command implementation.

use super::{open_existing, CommandResult};
use docket_core::{LogEntry, RecordStatus};
use serde::Serialize;
use std::path::Path;

/// Record log entry representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the record log.
    pub offset: u64,
    /// `active`, `deleted` or `unknown`.
    pub status: &'static str,
    /// Payload length in bytes.
    pub len: u32,
    /// Decoded document, if the payload decodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<serde_json::Value>,
}

impl RecordInfo {
    fn from_entry(entry: &LogEntry) -> CommandResult<Self> {
        let status = match entry.status {
            Some(RecordStatus::Active) => "active",
            Some(RecordStatus::Deleted) => "deleted",
            None => "unknown",
        };
        let document = match &entry.document {
            Some(doc) => Some(serde_json::to_value(doc)?),
            None => None,
        };
        Ok(Self {
            offset: entry.offset,
            status,
            len: entry.len,
            document,
        })
    }
}

/// Runs the dump-log command.
pub fn run(path: &Path, table: &str, limit: Option<usize>, format: &str) -> CommandResult {
    let db = open_existing(path)?;
    let entries = db.table(table)?.scan_log()?;
    let records = entries
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(RecordInfo::from_entry)
        .collect::<CommandResult<Vec<_>>>()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => print_text_output(&records),
    }
    Ok(())
}

fn print_text_output(records: &[RecordInfo]) {
    println!("{:>10}  {:<8}  {:>8}  DOCUMENT", "OFFSET", "STATUS", "LEN");
    for record in records {
        let document = record
            .document
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "{:>10}  {:<8}  {:>8}  {}",
            record.offset, record.status, record.len, document
        );
    }
    println!();
    println!("{} records", records.len());
}
