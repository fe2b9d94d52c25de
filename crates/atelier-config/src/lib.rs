//! # Atelier Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables.

use std::path::Path;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage engine: "memory", "localfs" or "sql"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Root directory for the filesystem engine
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Relational engine settings
    #[serde(default)]
    pub sql: SqlConfig,
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_root_path() -> String {
    "./data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SqlConfig {
    /// Full connection URL; when set, the individual fields below are ignored
    pub url: Option<String>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_sql_address")]
    pub address: String,

    #[serde(default = "default_sql_database")]
    pub database: String,

    /// Extra URL query parameters, e.g. "charset=utf8mb4"
    #[serde(default)]
    pub params: String,
}

fn default_sql_address() -> String {
    "127.0.0.1:3306".to_string()
}

fn default_sql_database() -> String {
    "atelier".to_string()
}

impl SqlConfig {
    /// The effective connection URL, composed from parts when `url` is unset.
    pub fn effective_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let mut url = format!(
            "mysql://{}:{}@{}/{}",
            self.user, self.password, self.address, self.database
        );
        if !self.params.is_empty() {
            url.push('?');
            url.push_str(&self.params);
        }
        url
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "pretty", "compact" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root_path: default_root_path(),
            sql: SqlConfig::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_format: default_log_format() }
    }
}

impl Config {
    /// Reject settings that cannot work before any engine is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.provider.to_lowercase().as_str() {
            "memory" => Ok(()),
            "localfs" | "local_fs" | "fs" => {
                if self.store.root_path.is_empty() {
                    return Err(ConfigError::Message(
                        "store.root_path must be set for the localfs provider".to_string(),
                    ));
                }
                Ok(())
            }
            "sql" | "mysql" | "sqlite" => {
                if self.store.sql.url.is_none() && self.store.sql.user.is_empty() {
                    return Err(ConfigError::Message(
                        "store.sql.url or store.sql.user must be set for the sql provider"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(ConfigError::Message(format!("unknown store.provider: {other}"))),
        }
    }
}

/// Load configuration from file and environment
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let builder = ConfigBuilder::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(Environment::with_prefix("ATELIER").separator("__"))
        .build()?;

    builder.try_deserialize()
}

/// Load configuration with defaults
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
    load(path).unwrap_or_default()
}
