//! Scan statistics

use serde::Serialize;
use std::time::Duration;

/// Crawler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Directories listed (including the root)
    pub directories: usize,
    /// Regular files seen
    pub files_seen: usize,
    /// Files handed to the record builder
    pub files_queued: usize,
    /// Candidate files skipped because the store already has them
    pub already_indexed: usize,
    /// Candidate files skipped because their path isn't valid Unicode
    pub skipped_non_utf8: usize,
    /// Directories that could not be listed
    pub directory_errors: usize,
}

impl CrawlStats {
    pub(crate) fn merge(&mut self, other: &CrawlStats) {
        self.directories += other.directories;
        self.files_seen += other.files_seen;
        self.files_queued += other.files_queued;
        self.already_indexed += other.already_indexed;
        self.skipped_non_utf8 += other.skipped_non_utf8;
        self.directory_errors += other.directory_errors;
    }
}

/// End-of-scan summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub crawl: CrawlStats,
    /// Records produced by the record builder
    pub records_built: usize,
    /// Files indexed with default media fields because decoding failed
    pub parse_failures: usize,
    /// Files dropped because they vanished before they could be built
    pub build_failures: usize,
    /// Rows the store actually inserted
    pub records_inserted: u64,
    /// Insert transactions committed
    pub batches_committed: usize,
    pub duration: Duration,
    /// Scan stopped early on request
    pub cancelled: bool,
}

impl ScanSummary {
    /// Inserted rows per second of wall time
    pub fn files_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.records_inserted as f64 / secs
        } else {
            0.0
        }
    }
}
