//! Database initialization
//!
//! Opens (or creates) the single-file audio index and makes sure the
//! `audio_files` table exists. Schema creation is idempotent and runs once
//! per opened pool.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Name of the one table the indexer writes
pub const AUDIO_FILES_TABLE: &str = "audio_files";

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
///
/// The pool holds exactly one connection. Every reader and writer in the
/// process queues on that connection, which is what serializes access to the
/// embedded store.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_audio_files_table(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database
///
/// The single connection is pinned (no idle timeout, no max lifetime) since
/// an in-memory database disappears with its connection.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_audio_files_table(&pool).await?;

    Ok(pool)
}

/// Create the audio_files table
///
/// `path` is the unique identity of a record; `INSERT OR IGNORE` against it
/// is what makes batch insertion idempotent.
pub async fn create_audio_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audio_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            duration REAL NOT NULL DEFAULT 0,
            num_user_tags INTEGER NOT NULL DEFAULT 0,
            user_tags TEXT NOT NULL DEFAULT '',
            num_auto_tags INTEGER NOT NULL DEFAULT 0,
            auto_tags TEXT NOT NULL DEFAULT '',
            user_bpm INTEGER NOT NULL DEFAULT 0,
            user_key INTEGER NOT NULL DEFAULT 0,
            auto_bpm INTEGER NOT NULL DEFAULT 0,
            auto_key INTEGER NOT NULL DEFAULT 0,
            CHECK (size >= 0),
            CHECK (duration >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Check whether a table exists in the database
pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ? LIMIT 1",
    )
    .bind(table_name)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
