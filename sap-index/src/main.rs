//! sap-index - audio sample indexer
//!
//! Scans a sample library into the index database and searches it by name.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sap_common::config::{self, DATABASE_ENV};
use sap_index::{Library, Record, ScanOptions, ScanSummary};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sap-index
#[derive(Parser, Debug)]
#[command(name = "sap-index")]
#[command(about = "Index and search a library of audio samples")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/sap/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index database file
    #[arg(short, long, env = DATABASE_ENV)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every new .wav/.mp3 file under ROOT
    Scan {
        /// Sample folder (falls back to SAP_ROOT_FOLDER, then the config file)
        root: Option<PathBuf>,
    },
    /// List indexed files whose name contains QUERY
    Search {
        query: String,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the record count and the first records
    Stats {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_toml_config_or_default(args.config.as_deref())
        .context("Failed to load config")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = config::resolve_database_path(args.database.as_deref(), &toml_config);
    info!("Database: {}", db_path.display());

    let library = Library::open(&db_path, ScanOptions::from(&toml_config.scan))
        .await
        .with_context(|| format!("Failed to open index {}", db_path.display()))?;

    match args.command {
        Command::Scan { root } => {
            let root = config::resolve_root_folder(root.as_deref(), &toml_config)?;
            scan(&library, root).await?;
        }
        Command::Search { query, json } => {
            let records = library.search(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    print_record(record);
                }
                println!("{} match(es)", records.len());
            }
        }
        Command::Stats { limit } => {
            let count = library.store().count().await?;
            println!("{} files indexed", count);
            for record in library.store().first_n(limit).await? {
                print_record(&record);
            }
        }
    }

    library.store().close().await;
    Ok(())
}

async fn scan(library: &Library, root: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, stopping scan");
                cancel.cancel();
            }
        }
    });

    let before = library.store().count().await?;
    let summary = library
        .scan_with_cancel(&root, cancel)
        .await
        .with_context(|| format!("Scan of {} failed", root.display()))?;
    let after = library.store().count().await?;

    print_summary(&summary, after - before);
    Ok(())
}

fn print_summary(summary: &ScanSummary, files_scanned: i64) {
    if summary.cancelled {
        println!("Scan cancelled");
    }
    println!("Files scanned: {}", files_scanned);
    println!("Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("Files/sec: {:.1}", summary.files_per_second());
    if summary.parse_failures > 0 {
        println!("Indexed without audio info: {}", summary.parse_failures);
    }
    if summary.crawl.directory_errors > 0 {
        println!("Unreadable directories: {}", summary.crawl.directory_errors);
    }
}

fn print_record(record: &Record) {
    println!(
        "{}\t{:.2}s\t{}\t{}",
        record.name, record.duration, record.auto_tags, record.path
    );
}
