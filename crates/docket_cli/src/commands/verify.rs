//! Verify and reindex command implementations.

use super::{open_existing, CommandResult};
use docket_core::VerifyReport;
use std::path::Path;
use tracing::info;

/// Runs the verify command.
pub fn run(path: &Path, table: &str) -> CommandResult {
    info!("Verifying table {} at {:?}", table, path);
    let db = open_existing(path)?;
    println!("Verifying table {table} at {}", path.display());
    println!();

    let report = db.table(table)?.verify()?;
    info!(table, consistent = report.is_consistent(), records = report.records, "verification finished");
    print_report(&report);

    println!();
    if report.is_consistent() {
        println!("✓ Table verification passed");
        Ok(())
    } else {
        println!("✗ Table verification failed (run `docket reindex {table}` to repair)");
        Err("Verification failed".into())
    }
}

/// Runs the reindex command.
pub fn run_reindex(path: &Path, table: &str) -> CommandResult {
    info!("Rebuilding indexes of {} at {:?}", table, path);
    let db = open_existing(path)?;
    let keys = db.table(table)?.rebuild_indexes()?;
    info!(table, keys, "indexes rebuilt");
    println!("Rebuilt indexes of {table}: {keys} keys");
    Ok(())
}

fn print_report(report: &VerifyReport) {
    println!(
        "  records: {}, live: {}, indexed keys: {}",
        report.records, report.live_records, report.indexed_keys
    );
    for key in &report.dangling_primary {
        println!("    ERROR: primary key {key} points at an unreadable record");
    }
    for offset in &report.orphaned_records {
        println!("    ERROR: live record at offset {offset} is not indexed");
    }
    for entry in &report.dangling_secondary {
        println!(
            "    ERROR: {}={} lists offset {} which does not hold that value",
            entry.field, entry.value, entry.offset
        );
    }
    for entry in &report.missing_secondary {
        println!(
            "    ERROR: {}={} of record at offset {} is not indexed",
            entry.field, entry.value, entry.offset
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::doc;
    use docket_core::Database;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reindex_repairs_a_corrupt_primary_index() {
        let dir = tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let items = db.create_table("items", "id", &["tag"]).unwrap();
            items.insert(doc! { "id" => "a", "tag" => "x" }, None).unwrap();
            items.insert(doc! { "id" => "b", "tag" => "y" }, None).unwrap();
        }
        assert!(run(dir.path(), "items").is_ok());

        fs::write(dir.path().join("tables/items/pk.idx"), b"garbage").unwrap();
        assert!(run(dir.path(), "items").is_err());

        run_reindex(dir.path(), "items").unwrap();
        assert!(run(dir.path(), "items").is_ok());
    }

    #[test]
    fn unknown_table_is_an_error() {
        let dir = tempdir().unwrap();
        drop(Database::open(dir.path()).unwrap());
        assert!(run(dir.path(), "missing").is_err());
        assert!(run_reindex(dir.path(), "missing").is_err());
    }
}
