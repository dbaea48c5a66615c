//! Test Helper Utilities
//!
//! Shared utilities for testing sap-index

#![allow(dead_code)]

pub mod audio_generator;
pub mod sample_tree;

pub use audio_generator::{generate_test_wav, write_raw_wav, AudioConfig};
pub use sample_tree::SampleTree;
