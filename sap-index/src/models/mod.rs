//! Data models for sap-index
//!
//! - `Record`: one indexed file, as persisted
//! - `DiscoveredFile`: crawl output, build input
//! - `ScanSummary` / `CrawlStats`: end-of-scan reporting

pub mod record;
pub mod scan_result;

pub use record::{DiscoveredFile, Record};
pub use scan_result::{CrawlStats, ScanSummary};
