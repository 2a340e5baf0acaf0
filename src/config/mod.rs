//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Fail-fast validation of the signing material and limiter settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::middleware::rate_limit::RateLimitConfig;
use crate::services::auth::{PasswordHasher, DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB};
use crate::services::token::{
    SigningConfig, DEFAULT_TOKEN_LIFETIME_SECS, MAX_TOKEN_LIFETIME_SECS, MIN_SIGNING_KEY_LEN,
};

/// Startup-time configuration failure
///
/// Raised before the listener is bound; the process must not serve traffic
/// with an invalid configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::ConfigurationInvalid(reason.into())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use the first `X-Forwarded-For` entry as the client identifier.
    /// Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// Allow any origin (development only)
    #[serde(default)]
    pub permissive_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_forwarded_for: false,
            permissive_cors: false,
        }
    }
}

/// Token signing and lifetime configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// HMAC-SHA256 key; at least 16 bytes
    pub signing_key: String,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    /// Argon2 memory cost in KiB
    #[serde(default = "default_password_memory")]
    pub password_memory_kib: u32,
    /// Argon2 passes
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"<redacted>")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("password_memory_kib", &self.password_memory_kib)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}

fn default_issuer() -> String {
    "gatekeeper".to_string()
}

fn default_audience() -> String {
    "gatekeeper-api".to_string()
}

fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS as u64
}

fn default_password_memory() -> u32 {
    DEFAULT_MEMORY_KIB
}

fn default_password_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl AuthConfig {
    /// Build the process-wide signing configuration
    pub fn signing_config(&self) -> Result<SigningConfig, ConfigError> {
        SigningConfig::new(
            self.issuer.clone(),
            self.audience.clone(),
            self.signing_key.as_bytes().to_vec(),
        )
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        let secs = i64::try_from(self.token_lifetime_secs).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(MAX_TOKEN_LIFETIME_SECS))
    }

    /// Build the password hasher with the configured Argon2 cost
    pub fn password_hasher(&self) -> Result<PasswordHasher> {
        PasswordHasher::new(self.password_memory_kib, self.password_iterations)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://./data/gatekeeper.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file" or "both")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    fn parse_lenient(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/gatekeeper")
}

fn default_log_prefix() -> String {
    "gatekeeper".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                issuer: default_issuer(),
                audience: default_audience(),
                signing_key: "change-me-in-production-please".to_string(),
                token_lifetime_secs: default_token_lifetime(),
                password_memory_kib: default_password_memory(),
                password_iterations: default_password_iterations(),
            },
            rate_limit: RateLimitConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    ///
    /// The result is validated before it is returned.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("GATEKEEPER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        eprintln!("[CONFIG] Loading configuration from: {:?}", path);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/gatekeeper/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("gatekeeper/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = lookup("GATEKEEPER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GATEKEEPER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // Signing overrides
        if let Some(issuer) = lookup("GATEKEEPER_JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(audience) = lookup("GATEKEEPER_JWT_AUDIENCE") {
            self.auth.audience = audience;
        }
        if let Some(key) = lookup("GATEKEEPER_SIGNING_KEY") {
            self.auth.signing_key = key;
        }
        if let Some(secs) = lookup("GATEKEEPER_TOKEN_LIFETIME_SECS").and_then(|s| s.parse().ok()) {
            self.auth.token_lifetime_secs = secs;
        }

        // Rate limit overrides
        if let Some(limit) = lookup("GATEKEEPER_RATE_LIMIT").and_then(|s| s.parse().ok()) {
            self.rate_limit.request_limit = limit;
        }
        if let Some(secs) = lookup("GATEKEEPER_RATE_WINDOW_SECS").and_then(|s| s.parse().ok()) {
            self.rate_limit.window_secs = secs;
        }

        // Database overrides
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }

        // Logging overrides
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GATEKEEPER_LOG_FORMAT") {
            self.logging.format = LogFormat::parse_lenient(&format);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Building the signing config enforces the key length invariant
        self.auth.signing_config()?;

        if self.auth.token_lifetime_secs == 0 {
            return Err(ConfigError::invalid("Token lifetime must be greater than zero"));
        }
        if self.auth.token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS as u64 {
            return Err(ConfigError::invalid(format!(
                "Token lifetime cannot exceed {} seconds",
                MAX_TOKEN_LIFETIME_SECS
            )));
        }

        if self.auth.password_memory_kib < 8 || self.auth.password_iterations == 0 {
            return Err(ConfigError::invalid(
                "Password hashing cost must be at least 8 KiB and 1 pass",
            ));
        }

        self.rate_limit.validate()?;

        if self.server.port == 0 {
            return Err(ConfigError::invalid("Server port cannot be 0"));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::invalid("Database URL cannot be empty"));
        }

        Ok(())
    }
}
