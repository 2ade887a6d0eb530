//! Service configuration management

use admission_controller::AdmissionConfig;
use price_statistics::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener configuration
    pub server: ServerConfig,

    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Key protecting the usage endpoint
    pub access: AccessConfig,

    /// Price report configuration
    pub pricing: PricingConfig,

    /// Public endpoint rate limiting
    pub rate_limits: RateLimitConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Take the client address from X-Forwarded-For
    pub trust_proxy: bool,
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Endpoint key configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Key required by the usage endpoint; the endpoint is closed when unset
    pub api_key: Option<String>,
}

/// Price report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// IANA zone whose calendar defines "today" and "tomorrow"
    pub time_zone: String,

    /// Margin used when the request does not carry a usable one
    pub default_margin: Decimal,

    /// Number of most recent price rows fed to the statistics engine
    pub sample_window: u32,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per client per rolling minute on the public price endpoint
    pub public_requests_per_minute: u32,

    /// Upper bound on tracked clients
    pub max_tracked_clients: usize,

    /// Idle time before a client with nothing in flight is forgotten
    pub idle_grace_secs: u64,

    /// Background sweep cadence
    pub sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, trust_proxy: false }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "utility".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            time_zone: "Europe/Helsinki".to_string(),
            default_margin: Decimal::ZERO,
            sample_window: 300,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public_requests_per_minute: 60,
            max_tracked_clients: admission_controller::DEFAULT_MAX_TRACKED_IDENTITIES,
            idle_grace_secs: admission_controller::DEFAULT_IDLE_GRACE_SECS,
            sweep_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl RateLimitConfig {
    /// Admission controller settings for the public endpoint
    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            limit_per_window: self.public_requests_per_minute,
            window: Duration::from_secs(admission_controller::DEFAULT_WINDOW_SECS),
            idle_grace: Duration::from_secs(self.idle_grace_secs),
            max_tracked_identities: self.max_tracked_clients,
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

impl ServiceConfig {
    /// Load from an optional TOML file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Ok(toml::from_str(&content)?)
    }

    /// Override fields from variables resolved through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(trust_proxy) = lookup("TRUST_PROXY") {
            self.server.trust_proxy = trust_proxy == "true";
        }

        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = parse_var("DB_PORT", &port)?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PWD") {
            self.database.password = password;
        }
        if let Some(database) = lookup("DB_DB") {
            self.database.database = database;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DB_MAX_CONNECTIONS", &max)?;
        }

        if let Some(key) = lookup("KEY") {
            self.access.api_key = Some(key).filter(|key| !key.is_empty());
        }

        if let Some(limit) = lookup("PUBLIC_REQ_PER_MIN") {
            self.rate_limits.public_requests_per_minute = parse_var("PUBLIC_REQ_PER_MIN", &limit)?;
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX_CLIENTS") {
            self.rate_limits.max_tracked_clients = parse_var("RATE_LIMIT_MAX_CLIENTS", &max)?;
        }

        if let Some(zone) = lookup("PRICE_TIME_ZONE") {
            self.pricing.time_zone = zone;
        }
        if let Some(margin) = lookup("DEFAULT_MARGIN") {
            self.pricing.default_margin = parse_var("DEFAULT_MARGIN", &margin)?;
        }
        if let Some(window) = lookup("PRICE_SAMPLE_WINDOW") {
            self.pricing.sample_window = parse_var("PRICE_SAMPLE_WINDOW", &window)?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }
        self.server_addr()?;
        self.time_zone()?;

        if self.pricing.sample_window == 0 {
            return Err(ConfigError::invalid("pricing.sample_window", "must be at least 1"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be at least 1"));
        }

        self.rate_limits.admission_config().validate()?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::invalid("logging.level", format!("unknown level {other}"))),
        }
        match self.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::invalid("logging.format", format!("unknown format {other}")))
            }
        }

        Ok(())
    }

    /// Get the server address
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::invalid("server.host", e.to_string()))
    }

    /// Zone used for day boundaries in price reports
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.pricing.time_zone)
            .map_err(|e| ConfigError::invalid("pricing.time_zone", e.to_string()))
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}
