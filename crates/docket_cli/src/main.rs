//! Docket CLI
//!
//! Command-line tools for Docket database maintenance.
//!
//! # Commands
//!
//! - `inspect` - Display tables and their sizes
//! - `get` - Print the current document for a key
//! - `history` - Print every archived version of a key
//! - `at` - Print a key as it was at a point in time
//! - `dump-log` - Dump a table's record log for debugging
//! - `verify` - Check a table's indexes against its record log
//! - `reindex` - Rebuild a table's indexes from its record log

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docket command-line database tools.
#[derive(Parser)]
#[command(name = "docket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display tables and their sizes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the current document for a key
    Get {
        /// Table name
        table: String,
        /// Primary key (JSON, or plain text)
        key: String,
    },

    /// Print every archived version of a key
    History {
        /// Table name
        table: String,
        /// Primary key (JSON, or plain text)
        key: String,
    },

    /// Print a key as it was at a point in time
    At {
        /// Table name
        table: String,
        /// Primary key (JSON, or plain text)
        key: String,
        /// Seconds since the Unix epoch
        timestamp: f64,
    },

    /// Dump a table's record log for debugging
    DumpLog {
        /// Table name
        table: String,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a table's indexes against its record log
    Verify {
        /// Table name
        table: String,
    },

    /// Rebuild a table's indexes from its record log
    Reindex {
        /// Table name
        table: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Get { table, key } => {
            let path = cli.path.ok_or("Database path required for get")?;
            commands::get::run(&path, &table, &key)?;
        }
        Commands::History { table, key } => {
            let path = cli.path.ok_or("Database path required for history")?;
            commands::history::run_history(&path, &table, &key)?;
        }
        Commands::At {
            table,
            key,
            timestamp,
        } => {
            let path = cli.path.ok_or("Database path required for at")?;
            commands::history::run_at(&path, &table, &key, timestamp)?;
        }
        Commands::DumpLog {
            table,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for dump-log")?;
            commands::dump_log::run(&path, &table, limit, &format)?;
        }
        Commands::Verify { table } => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, &table)?;
        }
        Commands::Reindex { table } => {
            let path = cli.path.ok_or("Database path required for reindex")?;
            commands::verify::run_reindex(&path, &table)?;
        }
        Commands::Version => {
            println!("Docket CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Docket Core v{}", docket_core::VERSION);
        }
    }

    Ok(())
}
