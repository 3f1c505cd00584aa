//! Application configuration.
//!
//! Aggregates the bus, pool, dashboard and auth sections into a single
//! [`CopiumConfig`] that can be loaded from YAML files and environment
//! variables. Every section has working defaults, so
//! `CopiumConfig::default()` runs standalone as is.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

pub use ::config::ConfigError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "copium.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "COPIUM_CONFIG";
/// Prefix for configuration environment variables (`COPIUM__POOL__WORKERS`).
pub const CONFIG_ENV_PREFIX: &str = "COPIUM";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "COPIUM_LOG";

/// Event bus and publish settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Upper bound on one publish, retries included.
    pub publish_timeout_secs: u64,
    /// Retries after the first failed publish attempt.
    pub publish_retries: usize,
    /// Deliveries of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Wait before a nacked message is redelivered.
    pub redelivery_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            publish_timeout_secs: 10,
            publish_retries: 3,
            max_delivery_attempts: 5,
            redelivery_delay_ms: 250,
        }
    }
}

impl BusConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

/// Consumer dispatch pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    /// Jobs buffered before `submit` waits.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// Dashboard pagination settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub min_hits: usize,
    pub max_hits: usize,
    pub cache_ttl_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            min_hits: 10,
            max_hits: 18,
            cache_ttl_secs: 300,
        }
    }
}

impl DashboardConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Static session tokens for standalone mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token to owner.
    pub tokens: HashMap<String, String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CopiumConfig {
    pub bus: BusConfig,
    pub pool: PoolConfig,
    pub dashboard: DashboardConfig,
    pub auth: AuthConfig,
}

impl CopiumConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `copium.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests;
