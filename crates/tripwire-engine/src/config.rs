use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;
use tripwire_events::EventKind;

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("IO error reading config: {0}")]
    IoError(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the shared timer in milliseconds (default: 1000)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Selection state used when neither the event nor the scope names one
    #[serde(default = "default_state")]
    pub default_state: String,

    /// Event kinds that are not available in this environment
    #[serde(default)]
    pub disabled_events: Vec<EventKind>,

    /// Drop activations while the owning scope is being edited (default: true)
    #[serde(default = "default_suppress_while_editing")]
    pub suppress_while_editing: bool,
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_state() -> String {
    "$".to_string()
}

fn default_suppress_while_editing() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            default_state: default_state(),
            disabled_events: Vec::new(),
            suppress_while_editing: default_suppress_while_editing(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }
}
