//! Typed settings loaded from the environment, following a typed-options-
//! struct convention rather than a config-file crate.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct DbConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DbConnectionConfig {
    fn from_env(prefix: &'static str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: required_env(prefix, "HOST")?,
            port: parse_env(prefix, "PORT", 5432)?,
            database: required_env(prefix, "DATABASE")?,
            user: required_env(prefix, "USER")?,
            password: required_env(prefix, "PASSWORD")?,
        })
    }

    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub local: DbConnectionConfig,
    pub remote: DbConnectionConfig,
    pub pool: PoolConfig,
    pub interval_seconds: u64,
    pub log_level: String,
    pub log_format: LogFormat,
    pub tenant_api_key_seed: Option<String>,
    pub refresh_tenant_config_each_cycle: bool,
    pub validator_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let pool = PoolConfig {
            max_connections: parse_env("SYNC_POOL", "MAX_CONNECTIONS", 10)?,
            idle_timeout: Duration::from_secs(parse_env("SYNC_POOL", "IDLE_SECONDS", 30)?),
            connect_timeout: Duration::from_secs(parse_env(
                "SYNC_POOL",
                "CONNECT_TIMEOUT_SECONDS",
                5,
            )?),
        };

        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Ok(Self {
            local: DbConnectionConfig::from_env("POSTGRES_SYNC")?,
            remote: DbConnectionConfig::from_env("POSTGRES_CLIENT")?,
            pool,
            interval_seconds: parse_env("SYNC", "INTERVAL_SECONDS", 60)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            tenant_api_key_seed: env::var("TENANT_API_KEY_SEED").ok(),
            refresh_tenant_config_each_cycle: env::var("SYNC_REFRESH_TENANT_CONFIG")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            validator_enabled: env::var("VALIDATOR_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}

fn env_name(prefix: &'static str, suffix: &'static str) -> String {
    format!("{prefix}_{suffix}")
}

fn required_env(prefix: &'static str, suffix: &'static str) -> Result<String, ConfigError> {
    let name = env_name(prefix, suffix);
    env::var(&name).map_err(|_| ConfigError::Missing(name))
}

fn parse_env<T>(prefix: &'static str, suffix: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let name = env_name(prefix, suffix);
    match env::var(&name) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            var: name,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
