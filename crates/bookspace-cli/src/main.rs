//! Bookspace CLI - headless client for local working sets
//!
//! Inspect, back up, and restore the on-disk working set without a
//! remote account.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use bookspace_core::export::{parse_backup, render_backup};
use bookspace_core::models::CollectionKind;
use bookspace_core::storage::{self, FileStore};
use bookspace_core::sync::merge_workspace;
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "bookspace")]
#[command(about = "Inspect and back up Bookspace working sets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local data directory
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-collection record counts
    Inspect {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a JSON backup of the working set
    Backup {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Merge a JSON backup into the working set
    Restore {
        /// Backup file to import
        input: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] bookspace_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bookspace=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Commands::Inspect { json } => run_inspect(json, &data_dir),
        Commands::Backup { output } => run_backup(output.as_deref(), &data_dir),
        Commands::Restore { input } => run_restore(&input, &data_dir),
    }
}

#[derive(Debug, Serialize)]
struct CollectionCount {
    collection: &'static str,
    records: usize,
}

fn run_inspect(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let store = FileStore::open(data_dir)?;
    let data = storage::load_all(&store)?;

    let counts = CollectionKind::ALL
        .iter()
        .map(|kind| CollectionCount {
            collection: kind.as_str(),
            records: data.collection(*kind).len(),
        })
        .collect::<Vec<CollectionCount>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for count in &counts {
            println!("{:<14} {}", count.collection, count.records);
        }
        println!("{:<14} {}", "config keys", data.config.len());
    }

    Ok(())
}

fn run_backup(output_path: Option<&Path>, data_dir: &Path) -> Result<(), CliError> {
    let store = FileStore::open(data_dir)?;
    let data = storage::load_all(&store)?;
    let rendered = render_backup(&data)?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

fn run_restore(input_path: &Path, data_dir: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(input_path)?;
    let imported = parse_backup(&raw)?;
    tracing::info!(
        records = imported.record_count(),
        "importing backup from {}",
        input_path.display()
    );

    let store = FileStore::open(data_dir)?;
    let existing = storage::load_all(&store)?;
    // Imported records go through the normal merge path, so a restore
    // never clobbers newer local edits.
    let merged = merge_workspace(&existing, &imported);
    storage::save_all(&store, &merged)?;

    println!("Restored {} records", merged.record_count());
    Ok(())
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("BOOKSPACE_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bookspace")
}
