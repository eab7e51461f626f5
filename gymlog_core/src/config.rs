//! Configuration file support for Gymlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/gymlog/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Which log store backs the workout log
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSONL file under the data directory
    #[default]
    Local,

    /// Spreadsheet web app endpoint
    Sheet {
        url: String,
        /// The sheet only accepts new rows
        #[serde(default)]
        append_only: bool,
    },

    /// Whole-document JSON bin service
    JsonBin {
        #[serde(default = "default_json_bin_url")]
        base_url: String,
        bin_id: String,
        #[serde(default)]
        master_key: Option<String>,
    },

    /// Hosted GraphQL database
    Graphql {
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
    },
}

impl StoreConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Local => "local",
            StoreConfig::Sheet { .. } => "sheet",
            StoreConfig::JsonBin { .. } => "json_bin",
            StoreConfig::Graphql { .. } => "graphql",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, StoreConfig::Local)
    }
}

/// Network and fallback behaviour for remote stores
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keep a snapshot of the last successful load to fall back on
    #[serde(default = "default_cache")]
    pub cache: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cache: default_cache(),
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry parameters for network failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("gymlog")
}

fn default_json_bin_url() -> String {
    "https://api.jsonbin.io/v3".into()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_cache() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    4000
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("gymlog").join("config.toml")
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        match &self.store {
            StoreConfig::Local => {}
            StoreConfig::Sheet { url, .. } => require("store.url", url)?,
            StoreConfig::JsonBin {
                base_url, bin_id, ..
            } => {
                require("store.base_url", base_url)?;
                require("store.bin_id", bin_id)?;
            }
            StoreConfig::Graphql { endpoint, .. } => require("store.endpoint", endpoint)?,
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }

        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data.data_dir.join("preferences.json")
    }

    pub fn local_log_path(&self) -> PathBuf {
        self.data.data_dir.join("log").join("entries.jsonl")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data.data_dir.join("cache").join("snapshot.json")
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Config(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store, StoreConfig::Local);
        assert_eq!(config.sync.timeout_secs, 15);
        assert!(config.sync.cache);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.store = StoreConfig::Graphql {
            endpoint: "https://db.example.com/graphql".into(),
            token: Some("secret".into()),
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.store, parsed.store);
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[store]
backend = "sheet"
url = "https://script.example.com/exec"

[retry]
max_attempts = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Sheet {
                url: "https://script.example.com/exec".into(),
                append_only: false,
            }
        );
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 250); // default
    }

    #[test]
    fn test_json_bin_uses_default_base_url() {
        let toml_str = r#"
[store]
backend = "json_bin"
bin_id = "65f0c0ffee"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        match config.store {
            StoreConfig::JsonBin { base_url, .. } => {
                assert_eq!(base_url, "https://api.jsonbin.io/v3")
            }
            other => panic!("unexpected store config: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let mut config = Config::default();
        config.store = StoreConfig::Graphql {
            endpoint: " ".into(),
            token: None,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.store, StoreConfig::Local);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.sync.cache = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.sync.cache);
    }
}
