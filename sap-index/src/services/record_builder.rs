//! Record builder
//!
//! Turns a discovered file into an immutable [`Record`]: identity fields from
//! the filesystem, media fields from the decoder when it succeeds, and auto
//! tags from the file name.

use crate::audio::{self, AudioFormat};
use crate::models::{DiscoveredFile, Record};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Minimum run of non-delimiter characters kept as a tag
pub const MIN_TAG_LENGTH: usize = 3;

/// Per-file build failures
#[derive(Debug, Error)]
pub enum BuildError {
    /// File disappeared or became unreadable between crawl and build
    #[error("Cannot stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of building one file
#[derive(Debug, Clone)]
pub struct BuiltRecord {
    pub record: Record,
    /// Decoding was attempted and failed; media fields are defaults
    pub parse_failed: bool,
}

/// Build the record for one file
///
/// Decoding failures are not errors: the record is still produced, with zero
/// media fields, so the file counts as indexed and isn't rescanned.
pub fn build(file: &DiscoveredFile) -> Result<BuiltRecord, BuildError> {
    let metadata = std::fs::metadata(&file.path).map_err(|source| BuildError::Metadata {
        path: file.path.clone(),
        source,
    })?;

    let name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);
    let mut record = Record::new(file.key.clone(), name, size);

    let tags = generate_auto_tags(&record.name);
    record.num_auto_tags = i32::try_from(tags.len()).unwrap_or(i32::MAX);
    record.auto_tags = concatenate_tags(&tags);

    let mut parse_failed = false;
    if let Some(format) = AudioFormat::from_path(&file.path) {
        // Header-only read: only the duration is stored, so no samples are decoded
        match audio::read_file_duration(format, &file.path) {
            Ok(duration) => record.duration = duration,
            Err(audio::ParseError::Unsupported(_)) => {}
            Err(e) => {
                debug!(path = %file.path.display(), error = %e, "Decode failed, indexing without media fields");
                parse_failed = true;
            }
        }
    }

    Ok(BuiltRecord {
        record,
        parse_failed,
    })
}

/// Split a file name into lower-case tags
///
/// Delimiters are `_ - . ( ) [ ]` and space. Runs shorter than
/// [`MIN_TAG_LENGTH`] characters are dropped.
pub fn generate_auto_tags(name: &str) -> Vec<String> {
    name.split(is_tag_delimiter)
        .filter(|run| run.chars().count() >= MIN_TAG_LENGTH)
        .map(str::to_lowercase)
        .collect()
}

/// Join tags with single spaces
pub fn concatenate_tags(tags: &[String]) -> String {
    tags.join(" ")
}

fn is_tag_delimiter(c: char) -> bool {
    matches!(c, '_' | '-' | '.' | '(' | ')' | '[' | ']' | ' ')
}
