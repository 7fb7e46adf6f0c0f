//! Configuration loading and validation

use anyhow::Result;
use keystone_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Vendor id of the alarm panel, used to recognize security status messages
    #[serde(default)]
    pub panel_id: u64,
    /// Path to the accessory cache file
    #[serde(default = "default_cache_path")]
    pub accessory_cache: String,
    /// Vendor dictionary to use instead of the built-in one
    #[serde(default)]
    pub dictionary: Option<String>,
    /// Capacity of the event queue between reader and worker
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// File of vendor events to replay, stdin when unset
    #[serde(default)]
    pub events: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            panel_id: 0,
            accessory_cache: default_cache_path(),
            dictionary: None,
            queue_depth: default_queue_depth(),
            events: None,
        }
    }
}

fn default_cache_path() -> String {
    "./accessories.json".to_string()
}

fn default_queue_depth() -> usize {
    256
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
