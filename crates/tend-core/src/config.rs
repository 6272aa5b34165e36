//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/tend/config.toml)
//! 3. Environment variables (TEND_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "TEND";

/// Default table holding the todo rows
const DEFAULT_TABLE: &str = "todos";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote store (e.g. https://project.example.co)
    #[serde(default)]
    pub store_url: Option<String>,

    /// Access key sent with every store request
    #[serde(default)]
    pub store_key: Option<String>,

    /// Table holding the tasks
    #[serde(default = "default_table")]
    pub table: String,

    /// Whether to open the push channel for live updates
    #[serde(default = "default_realtime_enabled")]
    pub realtime_enabled: bool,

    /// Log file path (when TEND_LOG is set); stderr if unset
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Simulated latency before suggestions are returned
    #[serde(default = "default_suggest_delay_ms")]
    pub suggest_delay_ms: u64,

    /// Simulated latency before a generated plan is returned
    #[serde(default = "default_plan_delay_ms")]
    pub plan_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            store_key: None,
            table: default_table(),
            realtime_enabled: default_realtime_enabled(),
            log_file: None,
            suggest_delay_ms: default_suggest_delay_ms(),
            plan_delay_ms: default_plan_delay_ms(),
        }
    }
}

/// Resolved connection settings for the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Base URL without trailing slash
    pub url: String,
    /// Access key
    pub key: String,
    /// Table name
    pub table: String,
}

impl StoreSettings {
    /// REST endpoint for the task table
    pub fn rest_endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// WebSocket endpoint for the push channel
    ///
    /// The access key is sent percent-encoded in the query string.
    pub fn realtime_endpoint(&self) -> Result<Url, ConfigError> {
        let invalid = || ConfigError::InvalidStoreUrl(self.url.clone());

        let mut endpoint = Url::parse(&format!("{}/realtime/v1/websocket", self.url))
            .map_err(|_| invalid())?;
        let scheme = match endpoint.scheme() {
            "https" => "wss",
            "http" => "ws",
            _ => return Err(invalid()),
        };
        endpoint.set_scheme(scheme).map_err(|_| invalid())?;
        endpoint
            .query_pairs_mut()
            .append_pair("apikey", &self.key)
            .append_pair("vsn", "1.0.0");
        Ok(endpoint)
    }
}

/// Problems with the store configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Store URL is not configured. Set TEND_STORE_URL or `tend config set store_url <url>`.")]
    MissingStoreUrl,

    #[error("Store access key is not configured. Set TEND_STORE_KEY or `tend config set store_key <key>`.")]
    MissingStoreKey,

    #[error("Invalid store URL '{0}': expected an http:// or https:// address")]
    InvalidStoreUrl(String),
}

impl ConfigError {
    /// True if a required value is simply absent
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingStoreUrl | ConfigError::MissingStoreKey
        )
    }
}

/// What to do when store settings are absent at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingConfigPolicy {
    /// Refuse to start
    Fail,
    /// Log a warning and run with a store that rejects every call
    Warn,
}

impl MissingConfigPolicy {
    /// Fail in debug builds, warn in release builds
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            MissingConfigPolicy::Fail
        } else {
            MissingConfigPolicy::Warn
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TEND_STORE_URL, TEND_STORE_KEY, TEND_TABLE, TEND_REALTIME)
    /// 2. Config file (~/.config/tend/config.toml or TEND_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // TEND_STORE_URL
        if let Ok(val) = std::env::var(format!("{}_STORE_URL", ENV_PREFIX)) {
            self.store_url = if val.is_empty() { None } else { Some(val) };
        }

        // TEND_STORE_KEY
        if let Ok(val) = std::env::var(format!("{}_STORE_KEY", ENV_PREFIX)) {
            self.store_key = if val.is_empty() { None } else { Some(val) };
        }

        // TEND_TABLE
        if let Ok(val) = std::env::var(format!("{}_TABLE", ENV_PREFIX)) {
            if !val.is_empty() {
                self.table = val;
            }
        }

        // TEND_REALTIME
        if let Ok(val) = std::env::var(format!("{}_REALTIME", ENV_PREFIX)) {
            self.realtime_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Resolve the store settings, reporting what is missing
    pub fn store_settings(&self) -> Result<StoreSettings, ConfigError> {
        let url = self
            .store_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingStoreUrl)?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidStoreUrl(url.to_string()));
        }

        let key = self
            .store_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingStoreKey)?;

        Ok(StoreSettings {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            table: self.table.clone(),
        })
    }

    /// Resolve store settings under a startup policy
    ///
    /// Returns `Ok(None)` when settings are missing and the policy allows
    /// running degraded. Invalid (as opposed to missing) values always fail.
    pub fn check_store(
        &self,
        policy: MissingConfigPolicy,
    ) -> Result<Option<StoreSettings>, ConfigError> {
        match self.store_settings() {
            Ok(settings) => Ok(Some(settings)),
            Err(e) if e.is_missing() && policy == MissingConfigPolicy::Warn => {
                warn!("{} Continuing without a working store.", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Simulated suggestion latency
    pub fn suggest_delay(&self) -> Duration {
        Duration::from_millis(self.suggest_delay_ms)
    }

    /// Simulated plan latency
    pub fn plan_delay(&self) -> Duration {
        Duration::from_millis(self.plan_delay_ms)
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TEND_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tend")
            .join("config.toml")
    }
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_realtime_enabled() -> bool {
    true
}

fn default_suggest_delay_ms() -> u64 {
    1000
}

fn default_plan_delay_ms() -> u64 {
    1500
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "TEND_STORE_URL",
        "TEND_STORE_KEY",
        "TEND_TABLE",
        "TEND_REALTIME",
    ];

    fn configured() -> Config {
        Config {
            store_url: Some("https://demo.example.co/".to_string()),
            store_key: Some("anon-key".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store_url.is_none());
        assert!(config.store_key.is_none());
        assert_eq!(config.table, "todos");
        assert!(config.realtime_enabled);
        assert_eq!(config.suggest_delay(), Duration::from_millis(1000));
        assert_eq!(config.plan_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_store_settings_missing() {
        let mut config = Config::default();
        assert_eq!(config.store_settings(), Err(ConfigError::MissingStoreUrl));

        config.store_url = Some("https://demo.example.co".to_string());
        assert_eq!(config.store_settings(), Err(ConfigError::MissingStoreKey));

        config.store_key = Some("   ".to_string());
        assert_eq!(config.store_settings(), Err(ConfigError::MissingStoreKey));
    }

    #[test]
    fn test_store_settings_invalid_url() {
        let mut config = configured();
        config.store_url = Some("ftp://nope".to_string());
        let err = config.store_settings().unwrap_err();
        assert!(!err.is_missing());
        assert!(err.to_string().contains("ftp://nope"));
    }

    #[test]
    fn test_store_settings_endpoints() {
        let settings = configured().store_settings().unwrap();
        assert_eq!(settings.url, "https://demo.example.co");
        assert_eq!(
            settings.rest_endpoint(),
            "https://demo.example.co/rest/v1/todos"
        );
        assert_eq!(
            settings.realtime_endpoint().unwrap().as_str(),
            "wss://demo.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );

        let local = StoreSettings {
            url: "http://localhost:54321".to_string(),
            key: "k".to_string(),
            table: "todos".to_string(),
        };
        assert!(local
            .realtime_endpoint()
            .unwrap()
            .as_str()
            .starts_with("ws://localhost:54321/"));
    }

    #[test]
    fn test_realtime_endpoint_encodes_key() {
        let settings = StoreSettings {
            url: "https://demo.example.co".to_string(),
            key: "a+b/c=d&e".to_string(),
            table: "todos".to_string(),
        };
        let endpoint = settings.realtime_endpoint().unwrap();
        assert_eq!(
            endpoint.query(),
            Some("apikey=a%2Bb%2Fc%3Dd%26e&vsn=1.0.0")
        );

        let key = endpoint
            .query_pairs()
            .find(|(name, _)| name == "apikey")
            .map(|(_, value)| value.into_owned());
        assert_eq!(key.as_deref(), Some("a+b/c=d&e"));
    }

    #[test]
    fn test_realtime_endpoint_rejects_other_schemes() {
        let settings = StoreSettings {
            url: "ftp://demo.example.co".to_string(),
            key: "k".to_string(),
            table: "todos".to_string(),
        };
        assert_eq!(
            settings.realtime_endpoint(),
            Err(ConfigError::InvalidStoreUrl("ftp://demo.example.co".to_string()))
        );
    }

    #[test]
    fn test_check_store_policy() {
        let config = Config::default();
        assert_eq!(
            config.check_store(MissingConfigPolicy::Fail),
            Err(ConfigError::MissingStoreUrl)
        );
        assert_eq!(config.check_store(MissingConfigPolicy::Warn), Ok(None));

        // Invalid values fail even when lenient
        let mut bad = configured();
        bad.store_url = Some("demo.example.co".to_string());
        assert!(bad.check_store(MissingConfigPolicy::Warn).is_err());

        assert!(configured()
            .check_store(MissingConfigPolicy::Fail)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_env_override_store() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("TEND_STORE_URL", "https://env.example.co");
        env::set_var("TEND_STORE_KEY", "env-key");
        env::set_var("TEND_TABLE", "tasks");
        config.apply_env_overrides();

        assert_eq!(config.store_url.as_deref(), Some("https://env.example.co"));
        assert_eq!(config.store_key.as_deref(), Some("env-key"));
        assert_eq!(config.table, "tasks");

        // Empty string clears it
        env::set_var("TEND_STORE_URL", "");
        config.apply_env_overrides();
        assert!(config.store_url.is_none());
    }

    #[test]
    fn test_env_override_realtime() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("TEND_REALTIME", "false");
        config.apply_env_overrides();
        assert!(!config.realtime_enabled);

        env::set_var("TEND_REALTIME", "1");
        config.apply_env_overrides();
        assert!(config.realtime_enabled);
    }

    #[test]
    fn test_load_from_path_partial_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let toml = r#"
            store_url = "https://file.example.co"
            store_key = "file-key"
            realtime_enabled = false
            suggest_delay_ms = 0
        "#;

        std::fs::write(&path, toml).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.store_url.as_deref(), Some("https://file.example.co"));
        assert!(!config.realtime_enabled);
        assert_eq!(config.suggest_delay(), Duration::ZERO);
        // Unspecified fields fall back to defaults
        assert_eq!(config.table, "todos");
        assert_eq!(config.plan_delay_ms, 1500);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = configured();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.store_url, config.store_url);
        assert_eq!(loaded.store_key, config.store_key);
        assert_eq!(loaded.table, config.table);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.store_url.is_none());
        assert!(config.realtime_enabled);
    }
}
