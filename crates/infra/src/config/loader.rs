//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `WARDEN_API_BASE_URL` is not set, falls back to a config file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `WARDEN_API_BASE_URL`: Backend base URL (required)
//! - `WARDEN_API_TIMEOUT_SECS`: Per-request timeout
//! - `WARDEN_RETRY_MAX_ATTEMPTS`: Attempts per request on network failure
//! - `WARDEN_RETRY_BASE_DELAY_MS`: First backoff delay
//! - `WARDEN_RETRY_MAX_DELAY_MS`: Backoff ceiling
//! - `WARDEN_SESSION_IDLE_TIMEOUT_SECS`: Idle timeout
//! - `WARDEN_SESSION_ABSOLUTE_TIMEOUT_SECS`: Absolute session lifetime
//! - `WARDEN_SESSION_PROACTIVE_REFRESH`: Refresh before expiry (true/false)
//! - `WARDEN_LOG_LEVEL`: Log level filter
//! - `WARDEN_LOG_FORMAT`: `compact`, `pretty` or `json`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./warden.toml` or `./warden.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names in the parent and grandparent directories
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use warden_domain::{Config, Result, WardenError};

const CONFIG_FILE_NAMES: &[&str] = &["warden.toml", "warden.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `WardenError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `WARDEN_API_BASE_URL` is required; every other setting keeps its
/// default unless its variable is set.
///
/// # Errors
/// Returns `WardenError::Config` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.api.base_url = env_var("WARDEN_API_BASE_URL")?;
    if let Some(timeout) = env_parse("WARDEN_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }

    if let Some(attempts) = env_parse("WARDEN_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(delay) = env_parse("WARDEN_RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = delay;
    }
    if let Some(delay) = env_parse("WARDEN_RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = delay;
    }

    if let Some(idle) = env_parse("WARDEN_SESSION_IDLE_TIMEOUT_SECS")? {
        config.session.idle_timeout_secs = idle;
    }
    if let Some(absolute) = env_parse("WARDEN_SESSION_ABSOLUTE_TIMEOUT_SECS")? {
        config.session.absolute_timeout_secs = absolute;
    }
    config.session.proactive_refresh =
        env_bool("WARDEN_SESSION_PROACTIVE_REFRESH", config.session.proactive_refresh);

    if let Ok(level) = std::env::var("WARDEN_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(format) = std::env::var("WARDEN_LOG_FORMAT") {
        config.logging.format = format;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Sections and fields missing from the file keep their defaults.
///
/// # Errors
/// Returns `WardenError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(WardenError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => search_config_paths().ok_or_else(|| {
            WardenError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| WardenError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content; format is detected by file
/// extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| WardenError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| WardenError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(WardenError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Search multiple paths for configuration files
///
/// Searches the current working directory, its parent and grandparent, then
/// the same three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn search_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `WardenError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| WardenError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable.
///
/// # Errors
/// Returns `WardenError::Config` if the variable is set but unparsable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| WardenError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const WARDEN_VARS: &[&str] = &[
        "WARDEN_API_BASE_URL",
        "WARDEN_API_TIMEOUT_SECS",
        "WARDEN_RETRY_MAX_ATTEMPTS",
        "WARDEN_RETRY_BASE_DELAY_MS",
        "WARDEN_RETRY_MAX_DELAY_MS",
        "WARDEN_SESSION_IDLE_TIMEOUT_SECS",
        "WARDEN_SESSION_ABSOLUTE_TIMEOUT_SECS",
        "WARDEN_SESSION_PROACTIVE_REFRESH",
        "WARDEN_LOG_LEVEL",
        "WARDEN_LOG_FORMAT",
    ];

    fn clear_env() {
        for key in WARDEN_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (key, value) in [("TEST_WARDEN_BOOL_1", "1"), ("TEST_WARDEN_BOOL_YES", "YES")] {
            std::env::set_var(key, value);
            assert!(env_bool(key, false));
            std::env::remove_var(key);
        }

        for (key, value) in [("TEST_WARDEN_BOOL_0", "0"), ("TEST_WARDEN_BOOL_OFF", "off")] {
            std::env::set_var(key, value);
            assert!(!env_bool(key, true));
            std::env::remove_var(key);
        }

        std::env::remove_var("TEST_WARDEN_BOOL_MISSING");
        assert!(env_bool("TEST_WARDEN_BOOL_MISSING", true));
        assert!(!env_bool("TEST_WARDEN_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("WARDEN_API_BASE_URL", "https://api.example.com/v1");
        std::env::set_var("WARDEN_API_TIMEOUT_SECS", "10");
        std::env::set_var("WARDEN_RETRY_MAX_ATTEMPTS", "5");
        std::env::set_var("WARDEN_SESSION_PROACTIVE_REFRESH", "false");
        std::env::set_var("WARDEN_LOG_FORMAT", "json");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.api.base_url, "https://api.example.com/v1");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert!(!config.session.proactive_refresh);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, WardenError::Config(ref msg) if msg.contains("WARDEN_API_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("WARDEN_API_BASE_URL", "https://api.example.com");
        std::env::set_var("WARDEN_RETRY_MAX_ATTEMPTS", "three");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(WardenError::Config(ref msg)) if msg.contains("WARDEN_RETRY_MAX_ATTEMPTS")));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_config() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("WARDEN_API_BASE_URL", "https://api.example.com");
        std::env::set_var("WARDEN_RETRY_MAX_ATTEMPTS", "0");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(WardenError::Config(_))));
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://api.example.com/v1"

[retry]
max_attempts = 4

[session]
idle_timeout_secs = 900
"#
        )
        .unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com/v1");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.session.idle_timeout_secs, 900);
        assert_eq!(config.storage.service_name, "warden");
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"api": {{"base_url": "http://localhost:9000", "timeout_secs": 5}}}}"#)
            .unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_secs, 5);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/warden.toml")));
        assert!(matches!(result, Err(WardenError::Config(ref msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        let result = parse_config("api: {}", &path);
        assert!(matches!(result, Err(WardenError::Config(ref msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_parse_config_invalid_toml() {
        let result = parse_config("[api\nbase_url = ", Path::new("warden.toml"));
        assert!(matches!(result, Err(WardenError::Config(ref msg)) if msg.contains("TOML")));
    }
}
