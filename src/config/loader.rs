//! Configuration Loader
//!
//! Environment-aware layered loading on top of the `config` crate. Files are optional;
//! anything they leave out falls back to the built-in defaults.

use super::error::{ConfigResult, ConfigurationError};
use super::TrackerConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_BASENAME: &str = "applytrack";
const ENV_PREFIX: &str = "APPLYTRACK";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TrackerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load from the default directory for the detected environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Same as [`Self::load_from_directory_with_env`] with the detected environment
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = crate::logging::get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load `applytrack.toml` plus the `applytrack.{environment}.toml` overlay from `config_dir`
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(config_dir, environment, None)
    }

    /// Like [`ConfigManager::load_from_directory_with_env`], but reads `APPLYTRACK__*`
    /// overrides from `overrides` instead of the process environment
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(config_dir, environment, Some(overrides))
    }

    fn load_layers(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base = config_directory.join(format!("{CONFIG_BASENAME}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_BASENAME}.{environment}.toml"));

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let config: TrackerConfig = Config::builder()
            .add_source(File::from(base.as_path()).format(FileFormat::Toml).required(false))
            .add_source(File::from(env_file.as_path()).format(FileFormat::Toml).required(false))
            .add_source(env_source)
            .build()
            .and_then(|merged| merged.try_deserialize::<TrackerConfig>())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        config.validate()?;

        info!(
            environment = environment,
            max_connections = config.database.max_connections,
            allow_backward = config.engine.allow_backward,
            max_batch_size = config.engine.max_batch_size,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn default_config_directory() -> PathBuf {
        env::var("APPLYTRACK_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Wrap an already-built configuration, e.g. for embedding or tests
    pub fn from_config(config: TrackerConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
