//! Engine configuration, loaded from TOML.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_restart_timeout_secs() -> u64 {
    180
}

fn default_buffer() -> usize {
    64
}

fn default_debug_types() -> HashMap<String, String> {
    [
        ("java", "java"),
        ("microprofile", "java"),
        ("spring", "java"),
        ("nodejs", "node"),
        ("swift", "lldb"),
        ("python", "python"),
    ]
    .into_iter()
    .map(|(lang, ty)| (lang.to_owned(), ty.to_owned()))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a restart may stay pending before it fails.
    #[serde(default = "default_restart_timeout_secs")]
    pub restart_timeout_secs: u64,
    /// Capacity of each session's inbound message queue.
    #[serde(default = "default_buffer")]
    pub event_buffer: usize,
    /// Capacity of each session's change broadcast.
    #[serde(default = "default_buffer")]
    pub notify_buffer: usize,
    /// Language (or project type) to debugger type.
    #[serde(default = "default_debug_types")]
    pub debug_types: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            restart_timeout_secs: default_restart_timeout_secs(),
            event_buffer: default_buffer(),
            notify_buffer: default_buffer(),
            debug_types: default_debug_types(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.validate()?;
        config.debug_types = config
            .debug_types
            .into_iter()
            .map(|(key, ty)| (key.to_ascii_lowercase(), ty))
            .collect();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.restart_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "restart_timeout_secs must be positive".into(),
            ));
        }
        if self.event_buffer == 0 || self.notify_buffer == 0 {
            return Err(ConfigError::Invalid("buffer sizes must be positive".into()));
        }
        Ok(())
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    /// Debugger type for a project, by language first, then project type.
    pub fn debug_type(&self, language: &str, project_type: &str) -> Option<&str> {
        self.debug_types
            .get(&language.to_ascii_lowercase())
            .or_else(|| self.debug_types.get(&project_type.to_ascii_lowercase()))
            .map(String::as_str)
    }
}
