//! Scan workflow
//!
//! Three concurrent stages joined by handoff queues:
//! crawl → build → persist. See [`pipeline::scan_directory`].

pub mod pipeline;

pub use pipeline::{scan_directory, ScanOptions};
