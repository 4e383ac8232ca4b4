//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ABSOLUTE_TIMEOUT_SECS, DEFAULT_ACCOUNT, DEFAULT_ACTIVITY_DEBOUNCE_MS,
    DEFAULT_BASE_DELAY_MS, DEFAULT_BASE_URL, DEFAULT_EXPIRY_MARGIN_SECS,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_IDLE_WARNING_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVICE_NAME,
    DEFAULT_WATCHDOG_INTERVAL_SECS,
};
use crate::errors::{Result, WardenError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetrySettings,
    pub session: SessionSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Backend API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

/// Network-level retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Session lifetime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Treat the access token as expired this many seconds early.
    pub expiry_margin_secs: i64,
    pub idle_timeout_secs: u64,
    pub absolute_timeout_secs: u64,
    /// Length of the warning window before the idle timeout.
    pub idle_warning_secs: u64,
    /// Activity records closer together than this are coalesced.
    pub activity_debounce_ms: u64,
    pub proactive_refresh: bool,
    pub watchdog_interval_secs: u64,
}

/// Credential storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub service_name: String,
    pub account: String,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `compact`, `pretty` or `json`
    pub format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            absolute_timeout_secs: DEFAULT_ABSOLUTE_TIMEOUT_SECS,
            idle_warning_secs: DEFAULT_IDLE_WARNING_SECS,
            activity_debounce_ms: DEFAULT_ACTIVITY_DEBOUNCE_MS,
            proactive_refresh: true,
            watchdog_interval_secs: DEFAULT_WATCHDOG_INTERVAL_SECS,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { service_name: DEFAULT_SERVICE_NAME.to_string(), account: DEFAULT_ACCOUNT.to_string() }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "compact".to_string() }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.absolute_timeout_secs)
    }

    pub fn idle_warning(&self) -> Duration {
        Duration::from_secs(self.idle_warning_secs)
    }

    pub fn activity_debounce(&self) -> Duration {
        Duration::from_millis(self.activity_debounce_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}

impl Config {
    /// Check cross-field invariants.
    ///
    /// # Errors
    /// Returns `WardenError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(WardenError::Config("api.base_url must not be empty".into()));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            WardenError::Config(format!("api.base_url is not a valid URL: {e}"))
        })?;
        if self.api.timeout_secs == 0 {
            return Err(WardenError::Config("api.timeout_secs must be greater than 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(WardenError::Config("retry.max_attempts must be greater than 0".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(WardenError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.session.idle_timeout_secs == 0 || self.session.absolute_timeout_secs == 0 {
            return Err(WardenError::Config("session timeouts must be greater than 0".into()));
        }
        if self.session.idle_warning_secs >= self.session.idle_timeout_secs {
            return Err(WardenError::Config(
                "session.idle_warning_secs must be shorter than session.idle_timeout_secs".into(),
            ));
        }
        if self.session.watchdog_interval_secs == 0 {
            return Err(WardenError::Config(
                "session.watchdog_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
