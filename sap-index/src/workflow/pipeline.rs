//! Scan pipeline
//!
//! Each stage runs on its own blocking thread:
//! - crawl: walks the tree and pushes unindexed files onto the file queue
//! - build: pops files, builds records, pushes them onto the record queue
//! - persist: pops records and commits them to the store in batches
//!
//! Each producer holds its output queue's `ProducingGuard`, so its consumer
//! can drain and exit however the producer ends, panics included. A stage
//! that ends abnormally cancels an internal token the other stages watch.

use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{DiscoveredFile, Record, ScanSummary};
use crate::queue::HandoffQueue;
use crate::services::{self, validate_root, Crawler};
use sap_common::config::{ScanConfig, DEFAULT_BATCH_SIZE, DEFAULT_CRAWL_WORKERS};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning for one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Upper bound on crawl worker threads
    pub crawl_workers: usize,
    /// Records per insert transaction
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            crawl_workers: DEFAULT_CRAWL_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            crawl_workers: config.crawl_workers,
            batch_size: config.batch_size,
        }
    }
}

#[derive(Debug, Default)]
struct BuildCounts {
    records_built: usize,
    parse_failures: usize,
    build_failures: usize,
}

#[derive(Debug, Default)]
struct PersistCounts {
    records_inserted: u64,
    batches_committed: usize,
}

/// Index every unindexed audio file under `root`
///
/// Returns once all three stages have exited. Cancelling `cancel` stops the
/// scan early: discovery and building stop, and records already built are
/// still committed. A store failure in any stage aborts the scan and is
/// returned.
pub async fn scan_directory(
    store: &Store,
    root: &Path,
    options: &ScanOptions,
    cancel: CancellationToken,
) -> Result<ScanSummary> {
    validate_root(root)?;

    let started = Instant::now();
    let runtime = Handle::current();
    let stop = cancel.child_token();
    let batch_size = options.batch_size.max(1);

    info!(root = %root.display(), "Scanning");

    let files: Arc<HandoffQueue<DiscoveredFile>> = Arc::new(HandoffQueue::new());
    let records: Arc<HandoffQueue<Record>> = Arc::new(HandoffQueue::new());

    // Both queues produce from the start so no consumer can see
    // "empty and not producing" before its producer has run.
    files.start_producing();
    records.start_producing();

    let crawl_task = {
        let crawler = Crawler::new(store.clone(), runtime.clone(), options.crawl_workers, stop.clone());
        let files = Arc::clone(&files);
        let root = root.to_path_buf();
        let abort = stop.clone().drop_guard();
        tokio::task::spawn_blocking(move || {
            let _producing = files.producing_guard();
            let stats = crawler.crawl(&root, &files)?;
            abort.disarm();
            Ok::<_, Error>(stats)
        })
    };

    let build_task = {
        let files = Arc::clone(&files);
        let records = Arc::clone(&records);
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || build_stage(&files, &records, &stop))
    };

    let persist_task = {
        let records = Arc::clone(&records);
        let store = store.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            persist_stage(&records, &store, &runtime, batch_size, &stop)
        })
    };

    let (crawl, built, persisted) = tokio::join!(crawl_task, build_task, persist_task);

    let crawl = joined(crawl, "crawl")??;
    let built = joined(built, "build")?;
    let persisted = joined(persisted, "persist")??;

    let summary = ScanSummary {
        crawl,
        records_built: built.records_built,
        parse_failures: built.parse_failures,
        build_failures: built.build_failures,
        records_inserted: persisted.records_inserted,
        batches_committed: persisted.batches_committed,
        duration: started.elapsed(),
        cancelled: cancel.is_cancelled(),
    };

    info!(
        "Scan {}: {} files indexed in {:.2}s ({:.1} files/s), {} unreadable",
        if summary.cancelled { "cancelled" } else { "complete" },
        summary.records_inserted,
        summary.duration.as_secs_f64(),
        summary.files_per_second(),
        summary.parse_failures
    );

    Ok(summary)
}

fn joined<T>(result: std::result::Result<T, JoinError>, stage: &str) -> Result<T> {
    result.map_err(|e| Error::Internal(format!("{} stage failed: {}", stage, e)))
}

fn build_stage(
    input: &HandoffQueue<DiscoveredFile>,
    output: &HandoffQueue<Record>,
    stop: &CancellationToken,
) -> BuildCounts {
    let _producing = output.producing_guard();
    let abort = stop.clone().drop_guard();
    let mut counts = BuildCounts::default();

    while let Some(file) = input.wait_pop() {
        if stop.is_cancelled() {
            break;
        }

        match services::build(&file) {
            Ok(built) => {
                if built.parse_failed {
                    counts.parse_failures += 1;
                }
                counts.records_built += 1;
                output.push(built.record);
            }
            Err(e) => {
                warn!("Skipping file: {}", e);
                counts.build_failures += 1;
            }
        }
    }

    abort.disarm();
    counts
}

fn persist_stage(
    input: &HandoffQueue<Record>,
    store: &Store,
    runtime: &Handle,
    batch_size: usize,
    stop: &CancellationToken,
) -> Result<PersistCounts> {
    let abort = stop.clone().drop_guard();
    let mut counts = PersistCounts::default();
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(record) = input.wait_pop() {
        batch.push(record);
        if batch.len() >= batch_size {
            commit(&mut batch, store, runtime, &mut counts)?;
        }
        if stop.is_cancelled() {
            // Keep what was already built, wait for nothing more
            while let Some(record) = input.try_pop() {
                batch.push(record);
            }
            break;
        }
    }

    commit(&mut batch, store, runtime, &mut counts)?;

    abort.disarm();
    Ok(counts)
}

fn commit(
    batch: &mut Vec<Record>,
    store: &Store,
    runtime: &Handle,
    counts: &mut PersistCounts,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let inserted = runtime.block_on(store.insert_batch(batch))?;
    counts.records_inserted += inserted;
    counts.batches_committed += 1;
    debug!("Committed batch of {} ({} new)", batch.len(), inserted);

    batch.clear();
    Ok(())
}
