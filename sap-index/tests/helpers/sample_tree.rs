//! Temporary sample library trees

use super::audio_generator::{generate_test_wav, AudioConfig};
use sap_index::{Library, ScanOptions, Store};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding a sample tree and an index database
pub struct SampleTree {
    dir: TempDir,
}

impl SampleTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir(dir.path().join("samples")).expect("create samples dir");
        Self { dir }
    }

    /// Root of the sample tree
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("samples")
    }

    /// Index database location (outside the sample tree)
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("index.db")
    }

    /// Write a valid WAV at `relative`
    pub fn wav(&self, relative: &str) -> PathBuf {
        let path = self.prepare(relative);
        generate_test_wav(&path, &AudioConfig::default()).expect("write wav");
        path
    }

    /// Write arbitrary bytes at `relative`
    pub fn file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.prepare(relative);
        fs::write(&path, contents).expect("write file");
        path
    }

    pub async fn open_library(&self, options: ScanOptions) -> Library {
        Library::open(&self.db_path(), options)
            .await
            .expect("open library")
    }

    pub async fn open_store(&self) -> Store {
        Store::open(&self.db_path()).await.expect("open store")
    }

    fn prepare(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        path
    }
}

/// File name component as a `String`
pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}
