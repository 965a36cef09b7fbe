//! Standard paths used by flowhub

use std::path::PathBuf;

/// Standard flowhub paths
pub struct Paths {
    /// Data directory (~/.local/share/flowhub)
    pub data: PathBuf,
    /// Config directory (~/.config/flowhub)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("flowhub");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("flowhub");

        Self { data, config }
    }

    /// Default location of the config file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }

    /// Default location of the hub snapshot
    pub fn store_file(&self) -> PathBuf {
        self.data.join("hub.json")
    }

    /// Default location of the fired-trigger journal
    pub fn trigger_log(&self) -> PathBuf {
        self.data.join("triggers.jsonl")
    }
}
