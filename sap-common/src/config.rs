//! Configuration loading and path resolution
//!
//! Settings come from an optional TOML file. Paths that the command line or
//! environment can also provide are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (database only)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the sample library root
pub const ROOT_FOLDER_ENV: &str = "SAP_ROOT_FOLDER";

/// Environment variable naming the index database file
pub const DATABASE_ENV: &str = "SAP_DATABASE";

/// Default number of directory crawl workers
pub const DEFAULT_CRAWL_WORKERS: usize = 12;

/// Default number of records committed per transaction
pub const DEFAULT_BATCH_SIZE: usize = 2048;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Sample library to scan when none is given on the command line
    pub root_folder: Option<PathBuf>,
    /// Index database file
    pub database: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info", "debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[scan]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on concurrent directory crawl workers
    pub crawl_workers: usize,
    /// Records per insert transaction
    pub batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            crawl_workers: DEFAULT_CRAWL_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ScanConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.crawl_workers == 0 {
            return Err(Error::Config("scan.crawl_workers must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("scan.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.scan.validate()?;
    Ok(config)
}

/// Load the config file if it exists, defaults otherwise
pub fn load_toml_config_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(TomlConfig::default()),
        },
    };

    if path.exists() {
        debug!("Loading config: {}", path.display());
        load_toml_config(&path)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(TomlConfig::default())
    }
}

/// Write a TOML config file, creating its directory if needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Platform config file location: `<config_dir>/sap/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sap").join("config.toml"))
}

/// Platform database location: `<data_local_dir>/sap/audio_files.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sap"))
        .unwrap_or_else(|| PathBuf::from("./sap_data"))
        .join("audio_files.db")
}

/// Resolve the sample library root
///
/// There is no compiled default: scanning an arbitrary guess of a directory
/// is never what the user wants.
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = env_path(ROOT_FOLDER_ENV) {
        return Ok(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return Ok(path.clone());
    }

    Err(Error::Config(format!(
        "No sample folder given. Pass one on the command line, set {}, or add root_folder to the config file",
        ROOT_FOLDER_ENV
    )))
}

/// Resolve the index database file
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = env_path(DATABASE_ENV) {
        return path;
    }

    if let Some(path) = &config.database {
        return path.clone();
    }

    default_database_path()
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
