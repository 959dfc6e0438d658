//! Configuration Loader
//!
//! Environment-aware loading of [`EngineConfig`]. Handles file discovery,
//! environment detection and layering through the `config` crate.

use super::error::ConfigResult;
use super::EngineConfig;
use crate::logging::get_environment;
use ::config::{Config, Environment, File, FileFormat, Map};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_STEM: &str = "workflow-engine";
const ENV_PREFIX: &str = "WORKFLOW_ENGINE";
const ENV_SEPARATOR: &str = "__";
const CONFIG_DIR_VAR: &str = "WORKFLOW_ENGINE_CONFIG_DIR";

#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load from a specific directory with an explicit environment name.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_source(config_dir, environment, None)
    }

    /// Like [`Self::load_from_directory_with_env`], with `overrides` standing in
    /// for the process environment (keys are full variable names such as
    /// `WORKFLOW_ENGINE__CACHE__TTL_SECONDS`).
    pub fn load_with_env_source(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        let environment = environment.to_lowercase();

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading workflow engine configuration"
        );

        let config = Self::build(&config_directory, &environment, overrides)?;
        config.validate()?;

        info!(
            environment = %environment,
            cache_ttl_seconds = config.cache.ttl_seconds,
            cache_max_entries = config.cache.max_entries,
            activity_timeout_ms = config.dispatch.activity_timeout_ms,
            failure_policy = ?config.dispatch.failure_policy,
            strict_schema = config.schema.strict,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_directory,
        }))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: EngineConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn build(
        config_directory: &Path,
        environment: &str,
        overrides: Option<Map<String, String>>,
    ) -> ConfigResult<EngineConfig> {
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let layered = Config::builder()
            .add_source(Config::try_from(&EngineConfig::default())?)
            .add_source(File::new(&base_file.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(File::new(&env_file.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(env_source)
            .build()?;

        Ok(layered.try_deserialize()?)
    }

    fn default_config_directory() -> PathBuf {
        std::env::var(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
