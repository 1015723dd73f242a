//! Configuration management
//!
//! This module handles loading and parsing configuration for the posts service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
///
/// For PostgreSQL either `url` is given, or it is assembled from
/// `host`/`port`/`name`/`user`/`password`. SQLite only uses `url`.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or postgres)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Full connection URL; takes precedence over the individual parts
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_database_host")]
    pub host: String,
    #[serde(default = "default_database_port")]
    pub port: u16,
    #[serde(default = "default_database_name")]
    pub name: String,
    #[serde(default = "default_database_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Connections kept open even when idle
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Upper bound on open connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Maximum wait for a free connection when the pool is exhausted
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Bound on the startup health check
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bound on a single repository statement
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: String::new(),
            host: default_database_host(),
            port: default_database_port(),
            name: default_database_name(),
            user: default_database_user(),
            password: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = match self.driver {
            DatabaseDriver::Sqlite => self.connection_url(),
            DatabaseDriver::Postgres => "[REDACTED]".to_string(),
        };
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("url", &url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// In-memory SQLite configuration used by tests
    pub fn sqlite_memory() -> Self {
        Self {
            driver: DatabaseDriver::Sqlite,
            url: ":memory:".to_string(),
            ..Self::default()
        }
    }

    /// Resolve the URL handed to the driver.
    pub fn connection_url(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }
        match self.driver {
            DatabaseDriver::Sqlite => default_sqlite_path(),
            DatabaseDriver::Postgres => {
                let credentials = if self.password.is_empty() {
                    urlencoding::encode(&self.user).into_owned()
                } else {
                    format!(
                        "{}:{}",
                        urlencoding::encode(&self.user),
                        urlencoding::encode(&self.password)
                    )
                };
                format!(
                    "postgres://{}@{}:{}/{}",
                    credentials, self.host, self.port, self.name
                )
            }
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

fn default_sqlite_path() -> String {
    "data/posts.db".to_string()
}

fn default_database_host() -> String {
    "localhost".to_string()
}

fn default_database_port() -> u16 {
    5432
}

fn default_database_name() -> String {
    "postgres".to_string()
}

fn default_database_user() -> String {
    "postgres".to_string()
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    1800
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// PostgreSQL
    Postgres,
}

impl fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - POSTBOARD_SERVER_HOST
    /// - POSTBOARD_SERVER_PORT
    /// - POSTBOARD_SERVER_CORS_ORIGIN
    /// - POSTBOARD_DATABASE_DRIVER
    /// - POSTBOARD_DATABASE_URL
    /// - POSTBOARD_DATABASE_HOST / _PORT / _NAME / _USER / _PASSWORD
    /// - POSTBOARD_DATABASE_MIN_CONNECTIONS / _MAX_CONNECTIONS
    /// - POSTBOARD_DATABASE_ACQUIRE_TIMEOUT_SECS
    /// - POSTBOARD_DATABASE_CONNECT_TIMEOUT_SECS
    /// - POSTBOARD_DATABASE_QUERY_TIMEOUT_SECS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pool cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        if db.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if db.min_connections > db.max_connections {
            return Err(ConfigError::ValidationError(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }
        if db.acquire_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "database.acquire_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if db.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "database.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if db.query_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "database.query_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if db.driver == DatabaseDriver::Postgres && db.url.is_empty() && db.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url or database.name is required for postgres".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("POSTBOARD_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("POSTBOARD_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("POSTBOARD_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("POSTBOARD_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "postgres" | "postgresql" => self.database.driver = DatabaseDriver::Postgres,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("POSTBOARD_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(host) = std::env::var("POSTBOARD_DATABASE_HOST") {
            self.database.host = host;
        }
        if let Some(port) = env_parse::<u16>("POSTBOARD_DATABASE_PORT") {
            self.database.port = port;
        }
        if let Ok(name) = std::env::var("POSTBOARD_DATABASE_NAME") {
            self.database.name = name;
        }
        if let Ok(user) = std::env::var("POSTBOARD_DATABASE_USER") {
            self.database.user = user;
        }
        if let Ok(password) = std::env::var("POSTBOARD_DATABASE_PASSWORD") {
            self.database.password = password;
        }
        if let Some(min) = env_parse::<u32>("POSTBOARD_DATABASE_MIN_CONNECTIONS") {
            self.database.min_connections = min;
        }
        if let Some(max) = env_parse::<u32>("POSTBOARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }
        if let Some(secs) = env_parse::<u64>("POSTBOARD_DATABASE_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("POSTBOARD_DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("POSTBOARD_DATABASE_QUERY_TIMEOUT_SECS") {
            self.database.query_timeout_secs = secs;
        }
    }
}

/// Read and parse an environment variable, ignoring unparsable values
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
