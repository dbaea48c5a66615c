//! sap-index library interface
//!
//! Indexes a tree of audio samples into an SQLite store and searches it by
//! name. Front ends use [`Library`]; the pieces are public for testing.

pub mod audio;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod workflow;

pub use crate::db::Store;
pub use crate::error::{Error, Result, ScanError};
pub use crate::models::{Record, ScanSummary};
pub use crate::workflow::ScanOptions;

use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Sample library: one store plus scan settings
#[derive(Debug, Clone)]
pub struct Library {
    store: Store,
    options: ScanOptions,
}

impl Library {
    /// Open (or create) the index at `db_path`
    pub async fn open(db_path: &Path, options: ScanOptions) -> Result<Self> {
        let store = Store::open(db_path).await?;
        Ok(Self::with_store(store, options))
    }

    pub fn with_store(store: Store, options: ScanOptions) -> Self {
        Self { store, options }
    }

    /// Index everything new under `root`, running to completion
    pub async fn scan(&self, root: &Path) -> Result<ScanSummary> {
        self.scan_with_cancel(root, CancellationToken::new()).await
    }

    /// Index everything new under `root`; cancelling `cancel` stops early
    pub async fn scan_with_cancel(
        &self,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<ScanSummary> {
        workflow::scan_directory(&self.store, root, &self.options, cancel).await
    }

    /// Records whose name contains `query`
    pub async fn search(&self, query: &str) -> Result<Vec<Record>> {
        self.store.search_by_name(query).await
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }
}
