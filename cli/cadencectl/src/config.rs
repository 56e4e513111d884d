//! CLI configuration.
//!
//! Precedence, lowest first: built-in defaults, the config file in the
//! platform config directory, `CADENCE_*` environment variables, then flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cadence_schedule::CoordinatorConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config file path.
pub fn config_path() -> Result<PathBuf> {
    ProjectDirs::from("com", "cadence", "cadence")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: CoordinatorConfig,
}

impl Config {
    /// Load config from the platform config directory, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply `CADENCE_*` environment overrides on top of the file.
    pub fn with_env(self) -> Result<CoordinatorConfig> {
        self.schedule
            .with_overrides(|key| std::env::var(key).ok())
            .context("Invalid CADENCE_* environment configuration")
    }
}
