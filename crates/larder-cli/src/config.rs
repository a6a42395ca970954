//! Operator configuration.
//!
//! Loaded from `larder-tokens.toml` (or `--config`), then overridden by
//! `LARDER__*` environment variables, e.g. `LARDER__STORAGE__POSTGRES__URL`.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use larder_auth::config::{ConfigError, TokenLifecycleConfig};
use larder_auth_postgres::PoolSettings;
use serde::{Deserialize, Serialize};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "larder-tokens.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub tokens: TokenLifecycleConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.tokens.validate().map_err(|e| e.to_string())?;

        if self.storage.backend == StorageBackend::Postgres {
            let url = self.storage.postgres.url.as_deref().unwrap_or_default();
            if url.trim().is_empty() {
                return Err(ConfigError::Missing("storage.postgres.url".to_string()).to_string());
            }
            if self.storage.postgres.max_connections == 0 {
                return Err(ConfigError::InvalidValue(
                    "storage.postgres.max_connections must be > 0".to_string(),
                )
                .to_string());
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue("logging.level must not be empty".to_string())
                .to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local ledger; state is lost when the command exits.
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        Self {
            url: None,
            max_connections: pool.max_connections,
            acquire_timeout: pool.acquire_timeout,
        }
    }
}

impl PostgresConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub mod loader {
    use std::path::Path;

    use super::*;

    /// Prefix of override variables; `__` separates nested keys.
    pub const ENV_PREFIX: &str = "LARDER";

    /// An explicit path must exist; the default file is optional.
    fn config_path(explicit: Option<&str>) -> Result<Option<PathBuf>, String> {
        match explicit {
            Some(p) if Path::new(p).is_file() => Ok(Some(PathBuf::from(p))),
            Some(p) => Err(format!("config file not found: {p}")),
            None => Ok(Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file())),
        }
    }

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        if let Some(file) = config_path(path)? {
            builder = builder.add_source(File::from(file));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize::<AppConfig>)
            .map_err(|e| format!("failed to load configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }
}
