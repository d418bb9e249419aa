//! # Configuration Module
//!
//! Engine tuning parameters and data directory management.
//!
//! ## Data Storage
//!
//! The catalog database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/nextrack/`
//! - macOS: `~/Library/Application Support/nextrack/`
//! - Windows: `%APPDATA%\nextrack\`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the system data directory cannot be determined or the
/// `nextrack` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please pass --db explicitly."
        )
    })?;

    let nextrack_dir = data_dir.join("nextrack");
    fs::create_dir_all(&nextrack_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            nextrack_dir.display()
        )
    })?;

    Ok(nextrack_dir)
}

/// Returns the default catalog database path, `<data dir>/nextrack/catalog.db`.
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Tuning parameters of the selection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Below this engagement fraction a cached bundle is reused.
    pub reuse_threshold: f64,
    /// Size of the shuffled most-voted set.
    pub top_k: usize,
    /// How much of the popularity ranking feeds the `tp` signal.
    pub top_tracks_limit: usize,
    /// Fixed base seed for the per-user random streams; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reuse_threshold: 0.75,
            top_k: 10,
            top_tracks_limit: 100,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid engine configuration in {}", path.display()))
    }

    /// Load from `path` if given, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.seed = seed;
        }
        self
    }
}
