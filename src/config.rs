//! TOML configuration
//!
//! Every field has a default, so an empty file is a valid config:
//!
//! ```toml
//! [browser]
//! headless = false
//! window_width = 1440
//!
//! [agent]
//! max_actions = 25
//! ```

use crate::browser::LaunchOptions;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Limits of the decision loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Actions one plan may execute before it is stopped
    pub max_actions: usize,

    /// Actions taken from a single model response
    pub max_actions_per_step: usize,

    /// Entries kept in the agent's memory
    pub memory_capacity: usize,

    /// Most recent steps shown in the prompt
    pub history_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_actions: 10,
            max_actions_per_step: 10,
            memory_capacity: 20,
            history_window: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: LaunchOptions,
    pub agent: AgentConfig,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("agent.max_actions", self.agent.max_actions),
            ("agent.max_actions_per_step", self.agent.max_actions_per_step),
            ("agent.memory_capacity", self.agent.memory_capacity),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Invalid("browser window size must be non-zero".to_string()));
        }
        Ok(())
    }
}
