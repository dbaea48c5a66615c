//! Index store
//!
//! One SQLite file holding the `audio_files` table. The pool behind
//! [`Store`] has a single connection, so every query from every stage is
//! serialized on it.

pub mod audio_files;

use crate::models::Record;
use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Handle to the audio index
///
/// Cheap to clone; clones share the same connection.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the index at `path` and ensure the schema exists
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = sap_common::db::init_database(path).await?;
        Ok(Self { pool })
    }

    /// Private index that lives as long as the returned store
    pub async fn open_in_memory() -> Result<Self> {
        let pool = sap_common::db::init_in_memory_database().await?;
        Ok(Self { pool })
    }

    /// Whether `path` is already indexed
    pub async fn exists(&self, path: &str) -> Result<bool> {
        audio_files::path_exists(&self.pool, path).await
    }

    /// Insert a batch atomically; duplicates are skipped, not errors
    pub async fn insert_batch(&self, records: &[Record]) -> Result<u64> {
        audio_files::insert_records(&self.pool, records).await
    }

    pub async fn search_by_name(&self, query: &str) -> Result<Vec<Record>> {
        audio_files::search_by_name(&self.pool, query).await
    }

    pub async fn count(&self) -> Result<i64> {
        audio_files::count_records(&self.pool).await
    }

    pub async fn first_n(&self, limit: usize) -> Result<Vec<Record>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        audio_files::load_first(&self.pool, limit).await
    }

    /// Close the pool, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
