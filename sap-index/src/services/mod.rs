//! Scan services
//!
//! - `crawler`: bounded-pool directory walk with store dedup
//! - `record_builder`: file → `Record`, auto tags

pub mod crawler;
pub mod record_builder;

pub use crawler::{validate_root, Crawler};
pub use record_builder::{build, concatenate_tags, generate_auto_tags, BuildError, BuiltRecord};
