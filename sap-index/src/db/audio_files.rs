//! `audio_files` table operations
//!
//! Free functions over a pool, used by [`super::Store`].

use crate::models::Record;
use crate::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str = r#"
    SELECT id, path, name, size, duration,
           num_user_tags, user_tags, num_auto_tags, auto_tags,
           user_bpm, user_key, auto_bpm, auto_key
    FROM audio_files
"#;

/// Whether a record with this exact path is already indexed
pub async fn path_exists(pool: &SqlitePool, path: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM audio_files WHERE path = ? LIMIT 1")
            .bind(path)
            .fetch_optional(pool)
            .await?;

    Ok(found.is_some())
}

/// Insert records in one transaction, skipping paths already present
///
/// Returns the number of rows actually inserted. On any statement failure the
/// transaction is dropped (rolled back) and the error returned, so a batch is
/// all-or-nothing.
pub async fn insert_records(pool: &SqlitePool, records: &[Record]) -> Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO audio_files (
                path, name, size, duration,
                num_user_tags, user_tags, num_auto_tags, auto_tags,
                user_bpm, user_key, auto_bpm, auto_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.path)
        .bind(&record.name)
        .bind(record.size)
        .bind(record.duration)
        .bind(record.num_user_tags)
        .bind(&record.user_tags)
        .bind(record.num_auto_tags)
        .bind(&record.auto_tags)
        .bind(record.user_bpm)
        .bind(record.user_key)
        .bind(record.auto_bpm)
        .bind(record.auto_key)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;

    Ok(inserted)
}

/// Records whose name contains `query` (SQL `LIKE`, ASCII case-insensitive)
pub async fn search_by_name(pool: &SqlitePool, query: &str) -> Result<Vec<Record>> {
    let sql = format!(
        "{} WHERE name LIKE '%' || ? || '%' ORDER BY id",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(query).fetch_all(pool).await?;

    Ok(rows.iter().map(record_from_row).collect())
}

/// Total number of indexed records
pub async fn count_records(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// First `limit` records in insertion order
pub async fn load_first(pool: &SqlitePool, limit: i64) -> Result<Vec<Record>> {
    let sql = format!("{} ORDER BY id LIMIT ?", SELECT_COLUMNS);
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;

    Ok(rows.iter().map(record_from_row).collect())
}

fn record_from_row(row: &SqliteRow) -> Record {
    Record {
        id: Some(row.get("id")),
        path: row.get("path"),
        name: row.get("name"),
        size: row.get("size"),
        duration: row.get("duration"),
        num_user_tags: row.get("num_user_tags"),
        user_tags: row.get("user_tags"),
        num_auto_tags: row.get("num_auto_tags"),
        auto_tags: row.get("auto_tags"),
        user_bpm: row.get("user_bpm"),
        user_key: row.get("user_key"),
        auto_bpm: row.get("auto_bpm"),
        auto_key: row.get("auto_key"),
    }
}
