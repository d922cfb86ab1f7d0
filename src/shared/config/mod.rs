//! Synchronization configuration
//!
//! Provides the named options consumed by the connection manager, the REST
//! client and the notification center. Values come from, in increasing
//! precedence: built-in defaults, a TOML file, and `VCMS_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default REST base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
/// Default push channel URL
pub const DEFAULT_PUSH_CHANNEL_URL: &str = "ws://localhost:8080/ws";

const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 5_000;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_NOTIFICATION_DURATION_MS: u64 = 5_000;
const DEFAULT_DEDUPE_WINDOW_MS: u64 = 1_000;

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Base URL of the REST API
    pub api_base_url: String,
    /// URL of the persistent push channel
    pub push_channel_url: String,
    /// First reconnect delay; doubled on every further attempt
    pub reconnect_base_delay_ms: u64,
    /// Reconnect attempts before giving up with `Error`
    pub max_reconnect_attempts: u32,
    /// Interval between liveness pings
    pub heartbeat_interval_ms: u64,
    /// Deadline for REST requests
    pub request_timeout_ms: u64,
    /// Deadline for the push channel handshake
    pub handshake_timeout_ms: u64,
    /// Quiet period before a filter change triggers a load
    pub debounce_ms: u64,
    /// How long transient notifications stay visible
    pub notification_duration_ms: u64,
    /// Window in which identical notifications are collapsed
    pub dedupe_window_ms: u64,
    /// Bearer token sent with REST requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            push_channel_url: DEFAULT_PUSH_CHANNEL_URL.to_string(),
            reconnect_base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            notification_duration_ms: DEFAULT_NOTIFICATION_DURATION_MS,
            dedupe_window_ms: DEFAULT_DEDUPE_WINDOW_MS,
            auth_token: None,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Default location of the per-user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vcms").join("sync.toml"))
    }

    /// Load the per-user file if present, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("[Config] Loading {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `VCMS_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VCMS_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = lookup("VCMS_PUSH_CHANNEL_URL") {
            self.push_channel_url = url;
        }
        if let Some(raw) = lookup("VCMS_RECONNECT_BASE_DELAY_MS") {
            self.reconnect_base_delay_ms = parse_number("VCMS_RECONNECT_BASE_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("VCMS_MAX_RECONNECT_ATTEMPTS") {
            self.max_reconnect_attempts = parse_number("VCMS_MAX_RECONNECT_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("VCMS_HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval_ms = parse_number("VCMS_HEARTBEAT_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("VCMS_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("VCMS_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(token) = lookup("VCMS_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.is_empty() {
            return Err(ConfigError::MissingValue("apiBaseUrl"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api_base_url.clone()));
        }
        if self.push_channel_url.is_empty() {
            return Err(ConfigError::MissingValue("pushChannelUrl"));
        }
        if !(self.push_channel_url.starts_with("ws://") || self.push_channel_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.push_channel_url.clone()));
        }
        let non_zero = [
            ("reconnectBaseDelayMs", self.reconnect_base_delay_ms),
            ("heartbeatIntervalMs", self.heartbeat_interval_ms),
            ("requestTimeoutMs", self.request_timeout_ms),
            ("handshakeTimeoutMs", self.handshake_timeout_ms),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: name,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    /// Get the full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        message: format!("'{}' is not a number", raw),
    })
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn push_channel_url(mut self, url: impl Into<String>) -> Self {
        self.config.push_channel_url = url.into();
        self
    }

    pub fn reconnect_base_delay_ms(mut self, millis: u64) -> Self {
        self.config.reconnect_base_delay_ms = millis;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.config.heartbeat_interval_ms = millis;
        self
    }

    pub fn request_timeout_ms(mut self, millis: u64) -> Self {
        self.config.request_timeout_ms = millis;
        self
    }

    pub fn handshake_timeout_ms(mut self, millis: u64) -> Self {
        self.config.handshake_timeout_ms = millis;
        self
    }

    pub fn debounce_ms(mut self, millis: u64) -> Self {
        self.config.debounce_ms = millis;
        self
    }

    pub fn notification_duration_ms(mut self, millis: u64) -> Self {
        self.config.notification_duration_ms = millis;
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
}
