//! Runtime configuration
//!
//! `RunnerConfig` drives the orchestrator; `ParleyConfig` is the file-level shape front ends
//! load from TOML.

use crate::util::errors::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_start_node() -> String {
    "Start".to_string()
}

fn default_event_capacity() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Node used by `DialogueRunner::start_default`.
    #[serde(default = "default_start_node")]
    pub start_node: String,

    /// After an option is chosen, present its line to the views before continuing.
    #[serde(default)]
    pub run_selected_option_as_line: bool,

    /// Buffer size of the runner event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_node: default_start_node(),
            run_selected_option_as_line: false,
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParleyConfig {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ParleyConfig {
    pub fn from_toml_str(content: &str) -> ParleyResult<Self> {
        let config: ParleyConfig = toml::from_str(content)
            .map_err(|e| ParleyError::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ParleyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ParleyError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> ParleyResult<()> {
        if self.runner.start_node.trim().is_empty() {
            return Err(ParleyError::Config(
                "runner.start_node must not be empty".to_string(),
            ));
        }
        if self.runner.event_capacity == 0 {
            return Err(ParleyError::Config(
                "runner.event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
