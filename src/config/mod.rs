//! Configuration management
//!
//! This module handles loading and parsing configuration for FloatChat.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
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
    /// Session credential configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Chat behaviour
    #[serde(default)]
    pub chat: ChatConfig,
    /// Upload (NetCDF conversion) configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Log retention windows
    #[serde(default)]
    pub retention: RetentionConfig,
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
    /// CORS allowed origin (for cookie-based auth)
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
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:5000".to_string()
}

/// Database configuration (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Seed the sample floats and profiles on start-up
    #[serde(default = "default_true")]
    pub seed_samples: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            seed_samples: true,
        }
    }
}

fn default_database_url() -> String {
    "data/floatchat.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Session credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a login, in minutes
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Key used to sign stored credentials. A random key is generated at
    /// start-up when unset, so credentials do not survive a restart.
    #[serde(default)]
    pub secret: Option<String>,
    /// Cookie holding the stored credential
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
            secret: None,
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_session_ttl_minutes() -> i64 {
    60
}

fn default_cookie_name() -> String {
    "floatchat_session".to_string()
}

/// Chat behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Delay before the bot reply is appended, in milliseconds
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    /// Number of knowledge documents attached to a reply
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: default_reply_delay_ms(),
            max_sources: default_max_sources(),
        }
    }
}

impl ChatConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

fn default_reply_delay_ms() -> u64 {
    1000
}

fn default_max_sources() -> usize {
    3
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Staging directory for uploaded files
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 16MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Simulated conversion time, in milliseconds
    #[serde(default = "default_conversion_delay_ms")]
    pub conversion_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            conversion_delay_ms: default_conversion_delay_ms(),
        }
    }
}

impl UploadConfig {
    pub fn conversion_delay(&self) -> Duration {
        Duration::from_millis(self.conversion_delay_ms)
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    16 * 1024 * 1024 // 16MB
}

fn default_conversion_delay_ms() -> u64 {
    2000
}

/// Retention windows for the log collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Chat logs older than this are purged
    #[serde(default = "default_chat_log_days")]
    pub chat_log_days: i64,
    /// System logs older than this are purged
    #[serde(default = "default_system_log_days")]
    pub system_log_days: i64,
    /// Interval between retention sweeps, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            chat_log_days: default_chat_log_days(),
            system_log_days: default_system_log_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_chat_log_days() -> i64 {
    365
}

fn default_system_log_days() -> i64 {
    90
}

fn default_sweep_interval_secs() -> u64 {
    3600
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
    ParseError { path: String, message: String },
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

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - FLOATCHAT_SERVER_HOST
    /// - FLOATCHAT_SERVER_PORT
    /// - FLOATCHAT_DATABASE_URL
    /// - FLOATCHAT_SESSION_SECRET
    /// - FLOATCHAT_SESSION_TTL_MINUTES
    /// - FLOATCHAT_CHAT_REPLY_DELAY_MS
    /// - FLOATCHAT_UPLOAD_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("FLOATCHAT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("FLOATCHAT_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("FLOATCHAT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("FLOATCHAT_SESSION_SECRET") {
            self.session.secret = Some(secret);
        }
        if let Ok(ttl) = std::env::var("FLOATCHAT_SESSION_TTL_MINUTES") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                self.session.ttl_minutes = ttl;
            }
        }
        if let Ok(delay) = std::env::var("FLOATCHAT_CHAT_REPLY_DELAY_MS") {
            if let Ok(delay) = delay.parse::<u64>() {
                self.chat.reply_delay_ms = delay;
            }
        }
        if let Ok(path) = std::env::var("FLOATCHAT_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_minutes must be positive".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        if self.retention.chat_log_days <= 0 || self.retention.system_log_days <= 0 {
            return Err(ConfigError::ValidationError(
                "retention windows must be positive".to_string(),
            ));
        }
        Ok(())
    }
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

// Shared by every test that touches FLOATCHAT_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
