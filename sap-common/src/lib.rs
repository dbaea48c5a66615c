//! # Sap Common Library
//!
//! Shared code for the sample indexer and its front ends:
//! - Common error type
//! - TOML configuration loading and path resolution
//! - Database initialization (audio_files schema)

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
