//! # Configuration
//!
//! Typed configuration for the transition engine, loaded in layers by [`ConfigManager`]:
//! built-in defaults, `config/applytrack.toml`, `config/applytrack.{env}.toml`, then
//! `APPLYTRACK__*` environment variables.
//!
//! ```rust,no_run
//! use applytrack_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let engine = manager.config().engine.clone();
//! assert!(engine.max_batch_size > 0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Apply pending migrations when connecting
    pub run_migrations: bool,
}

/// Limits and policy injected into the engine at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub allow_backward: bool,
    pub max_batch_size: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub default_trend_days: u32,
    pub max_trend_days: u32,
    pub max_note_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Overrides the environment-derived level when set
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            engine: EngineConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/applytrack_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
            run_migrations: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_backward: defaults::ALLOW_BACKWARD,
            max_batch_size: defaults::MAX_BATCH_SIZE,
            default_page_size: defaults::DEFAULT_PAGE_SIZE,
            max_page_size: defaults::MAX_PAGE_SIZE,
            default_trend_days: defaults::DEFAULT_TREND_DAYS,
            max_trend_days: defaults::MAX_TREND_DAYS,
            max_note_length: defaults::MAX_NOTE_LENGTH,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            json_logs: false,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

impl TrackerConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                0,
                "pool size must be greater than 0",
            ));
        }

        self.engine.validate()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_batch_size",
                0,
                "batch size must be greater than 0",
            ));
        }

        if self.max_page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_page_size",
                0,
                "page size must be greater than 0",
            ));
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigurationError::invalid_value(
                "engine.default_page_size",
                self.default_page_size,
                "must be between 1 and engine.max_page_size",
            ));
        }

        if self.max_trend_days == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_trend_days",
                0,
                "trend window must be greater than 0",
            ));
        }

        if self.default_trend_days == 0 || self.default_trend_days > self.max_trend_days {
            return Err(ConfigurationError::invalid_value(
                "engine.default_trend_days",
                self.default_trend_days,
                "must be between 1 and engine.max_trend_days",
            ));
        }

        if self.max_note_length == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_note_length",
                0,
                "note length limit must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.engine.allow_backward);
        assert_eq!(config.engine.max_batch_size, 100);
        assert_eq!(config.engine.default_page_size, 50);
        assert_eq!(config.engine.max_trend_days, 365);
        assert_eq!(config.engine.max_note_length, 1000);
    }

    #[test]
    fn test_rejects_inconsistent_limits() {
        let mut config = TrackerConfig::default();
        config.engine.default_page_size = 200;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "engine.default_page_size"
        ));

        let mut config = TrackerConfig::default();
        config.engine.max_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.database.url = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }
}
