//! # Engine Configuration
//!
//! Layered configuration for the workflow engine: built-in defaults, then
//! `config/workflow-engine.toml`, then `config/workflow-engine.<env>.toml`,
//! then `WORKFLOW_ENGINE__<SECTION>__<KEY>` environment variables.
//!
//! ```toml
//! [cache]
//! ttl_seconds = 300
//! max_entries = 1000
//!
//! [dispatch]
//! activity_timeout_ms = 30000
//! failure_policy = "fail_fast"
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub schema: SchemaConfig,
    pub dispatch: DispatchConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a template entry stays fresh
    pub ttl_seconds: u64,
    pub max_entries: usize,
    /// Coalesce concurrent misses on the same key into one repository read
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: defaults::CACHE_TTL_SECONDS,
            max_entries: defaults::CACHE_MAX_ENTRIES,
            single_flight: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Reject input fields the schema does not describe
    pub strict: bool,
}

/// What the advancer does after an Activity fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed Activity
    #[default]
    FailFast,
    /// Run the remaining Activities of the Stage, then fail it
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub activity_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            activity_timeout_ms: defaults::ACTIVITY_TIMEOUT_MS,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl DispatchConfig {
    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// chrono format string for the timestamp in default display names
    pub display_name_timestamp_format: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            display_name_timestamp_format: defaults::DISPLAY_NAME_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` still takes precedence
    pub level: Option<String>,
    pub json: bool,
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "cache.ttl_seconds",
                "must be greater than zero",
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigurationError::invalid(
                "cache.max_entries",
                "must be greater than zero",
            ));
        }
        if self.dispatch.activity_timeout_ms == 0 {
            return Err(ConfigurationError::invalid(
                "dispatch.activity_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.workflow.display_name_timestamp_format.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                "workflow.display_name_timestamp_format",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
