//! Configuration management for flowhub

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "FLOWHUB_CONFIG";

/// Environment variable overriding `store_path`
pub const STORE_ENV: &str = "FLOWHUB_STORE";

/// Global flowhub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hub snapshot read by the file-backed store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Journal of fired marker triggers (JSON lines)
    #[serde(default = "default_trigger_log")]
    pub trigger_log: PathBuf,

    /// Prefix linking flow names to tool names
    #[serde(default = "default_flow_prefix")]
    pub flow_prefix: String,

    /// Server name reported on initialize
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Protocol version reported on initialize
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

fn default_store_path() -> PathBuf {
    Paths::new().store_file()
}

fn default_trigger_log() -> PathBuf {
    Paths::new().trigger_log()
}

fn default_flow_prefix() -> String {
    "ai_".to_string()
}

fn default_server_name() -> String {
    "flowhub".to_string()
}

fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            trigger_log: default_trigger_log(),
            flow_prefix: default_flow_prefix(),
            server_name: default_server_name(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Resolve the config file (explicit path, then `FLOWHUB_CONFIG`, then
    /// the standard location), load it and apply environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| Paths::new().config_file()),
        };

        let config = Self::load(&path)?;
        Ok(config.with_store_override(std::env::var_os(STORE_ENV).map(PathBuf::from)))
    }

    /// Replace `store_path` when an override is given
    pub fn with_store_override(mut self, store: Option<PathBuf>) -> Self {
        if let Some(path) = store {
            self.store_path = path;
        }
        self
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
