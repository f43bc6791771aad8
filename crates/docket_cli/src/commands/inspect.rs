//! Inspect command implementation.

use super::{open_existing, CommandResult};
use docket_core::Database;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Sum of all record log sizes in bytes.
    pub total_size: u64,
    /// Per-table details.
    pub tables: Vec<TableInfo>,
}

/// Details of a single table.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Primary key field.
    pub primary_key: String,
    /// Secondary-indexed fields.
    pub indexes: Vec<String>,
    /// Keys in the primary index.
    pub keys: usize,
    /// Records in the log, superseded and deleted ones included.
    pub records: usize,
    /// Active records.
    pub live_records: usize,
    /// Record log size in bytes.
    pub log_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CommandResult {
    let db = open_existing(path)?;
    let result = inspect(&db)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects table details.
pub fn inspect(db: &Database) -> CommandResult<InspectResult> {
    let mut tables = Vec::new();
    for name in db.table_names()? {
        let table = db.table(&name)?;
        let entries = table.scan_log()?;
        tables.push(TableInfo {
            primary_key: table.meta().pk.clone(),
            indexes: table.meta().indexes.clone(),
            keys: table.len(),
            records: entries.len(),
            live_records: entries.iter().filter(|e| e.is_live()).count(),
            log_size: table.log_size()?,
            name,
        });
    }

    Ok(InspectResult {
        path: db.path().display().to_string(),
        total_size: tables.iter().map(|t| t.log_size).sum(),
        tables,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Docket Database Inspection");
    println!("==========================");
    println!();
    println!("Path:       {}", result.path);
    println!("Total size: {}", format_size(result.total_size));
    println!();

    if result.tables.is_empty() {
        println!("No tables.");
        return;
    }

    println!("Tables:");
    for table in &result.tables {
        println!("  {} (pk: {})", table.name, table.primary_key);
        if !table.indexes.is_empty() {
            println!("    Indexes:  {}", table.indexes.join(", "));
        }
        println!("    Keys:     {}", table.keys);
        println!(
            "    Records:  {} ({} live)",
            table.records, table.live_records
        );
        println!("    Log size: {}", format_size(table.log_size));
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::{doc, Value};
    use tempfile::tempdir;

    #[test]
    fn counts_superseded_records() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let t = db.create_table("products", "id", &["category"]).unwrap();
        t.insert(doc! { "id" => "P1", "price" => 1 }, None).unwrap();
        t.update(&Value::from("P1"), doc! { "price" => 2 }, None).unwrap();

        let result = inspect(&db).unwrap();
        assert_eq!(result.tables.len(), 1);
        let info = &result.tables[0];
        assert_eq!(info.name, "products");
        assert_eq!(info.indexes, ["category"]);
        assert_eq!((info.keys, info.records, info.live_records), (1, 2, 1));
        assert_eq!(result.total_size, info.log_size);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
