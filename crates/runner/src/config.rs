//! Runner configuration
//!
//! JSON file, every field optional:
//!
//! ```json
//! {
//!   "align_bars": true,
//!   "event_channel_capacity": 1024,
//!   "log_level": "info",
//!   "connection": { "exchange": "binance", "url": "wss://...", "symbols": ["BTCUSDT"] }
//! }
//! ```

use expert_core::ConnectionDescriptor;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Event channel capacity must be greater than zero")]
    ZeroChannelCapacity,
    #[error("Unknown log level: '{0}'")]
    InvalidLogLevel(String),
    #[error("Thread name must not be empty: {0}")]
    EmptyThreadName(&'static str),
}

/// Settings of the dispatch engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Align bar drivers on wall-clock boundaries; when false they sleep
    /// the plain bar length from start
    pub align_bars: bool,
    /// Bound of the queue between the ingestion and scheduling threads
    pub event_channel_capacity: usize,
    /// Default log filter for binaries (`RUST_LOG` overrides it)
    pub log_level: String,
    pub scheduler_thread_name: String,
    pub ingestion_thread_name: String,
    /// Market connection used by the binary
    pub connection: Option<ConnectionDescriptor>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            align_bars: true,
            event_channel_capacity: 1024,
            log_level: "info".to_string(),
            scheduler_thread_name: "expert-scheduler".to_string(),
            ingestion_thread_name: "expert-ingestion".to_string(),
            connection: None,
        }
    }
}

impl RunnerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        self.level_filter()?;
        if self.scheduler_thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName("scheduler_thread_name"));
        }
        if self.ingestion_thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName("ingestion_thread_name"));
        }
        Ok(())
    }

    /// `log_level` as a filter
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.log_level.trim())
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}

/// Load and validate runner configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunnerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load and validate runner configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<RunnerConfig, ConfigError> {
    let config: RunnerConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<RunnerConfig, ConfigError> {
    let default_config = include_str!("runner_config.json");
    load_config_from_str(default_config)
}
