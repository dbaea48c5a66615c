//! Indexed file record

use serde::Serialize;
use std::path::PathBuf;

/// A file the crawler found that the store doesn't know yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Filesystem path as found during the crawl
    pub path: PathBuf,
    /// The same path as stored in the index (unique key)
    pub key: String,
}

impl DiscoveredFile {
    /// `None` when the path isn't valid Unicode and so can't be stored as-is
    pub fn new(path: PathBuf) -> Option<Self> {
        let key = path.to_str()?.to_owned();
        Some(Self { path, key })
    }
}

/// One row of `audio_files`
///
/// Built once by the record builder and never modified afterwards; the store
/// assigns `id` on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Store-assigned identity, `None` until persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub path: String,
    pub name: String,
    /// Size in bytes
    pub size: i64,
    /// Seconds; 0 when the file couldn't be decoded
    pub duration: f64,

    // user-submitted data
    pub num_user_tags: i32,
    pub user_tags: String,
    pub user_bpm: i32,
    pub user_key: i32,

    // auto-generated data
    pub num_auto_tags: i32,
    pub auto_tags: String,
    pub auto_bpm: i32,
    pub auto_key: i32,
}

impl Record {
    /// Record with identity fields set and every other field at its default
    pub fn new(path: impl Into<String>, name: impl Into<String>, size: i64) -> Self {
        Self {
            id: None,
            path: path.into(),
            name: name.into(),
            size,
            duration: 0.0,
            num_user_tags: 0,
            user_tags: String::new(),
            user_bpm: 0,
            user_key: 0,
            num_auto_tags: 0,
            auto_tags: String::new(),
            auto_bpm: 0,
            auto_key: 0,
        }
    }
}
