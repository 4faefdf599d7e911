//! Configuration management for AstroSync
//!
//! This crate handles loading and validating `.astrosync/config.toml`

use anyhow::Context;
use astro_common::{AstroError, Priority, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory (relative to the workspace root) holding config and data
pub const CONFIG_DIR: &str = ".astrosync";

/// Config file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync settings
    #[serde(default)]
    pub sync: SyncSection,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration ([storage])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file, relative to the config directory unless absolute
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Maximum records per partition before quota recovery kicks in
    #[serde(default)]
    pub max_records_per_partition: Option<usize>,

    /// Interval of the expiry sweep run by `astrosync run`
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("offline.db")
}
fn default_cleanup_interval() -> u64 {
    60 * 60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_records_per_partition: None,
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Sync configuration ([sync])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Base URL that queued relative urls are resolved against
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Optional bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_background_interval")]
    pub background_interval_secs: u64,

    /// Delay between reconnect and the triggered batch pass
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Per-strategy overrides, keyed by strategy name
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyOverride>,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_request_timeout() -> u64 {
    30_000
}
fn default_background_interval() -> u64 {
    5 * 60
}
fn default_settle_delay() -> u64 {
    2_000
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: None,
            request_timeout_ms: default_request_timeout(),
            background_interval_secs: default_background_interval(),
            settle_delay_ms: default_settle_delay(),
            strategies: BTreeMap::new(),
        }
    }
}

/// Partial override of a named sync strategy ([sync.strategies.<name>])
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StrategyOverride {
    #[serde(default)]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub retry_delay_ms: Option<u64>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    /// One of "client", "server", "merge", "prompt"
    #[serde(default)]
    pub conflict_resolution: Option<String>,
}

/// Network configuration ([network])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Initial connectivity signal when the platform gives none
    #[serde(default = "default_true")]
    pub assume_online: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            assume_online: true,
        }
    }
}

/// Logging configuration ([logging])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub json: bool,
}

const DEFAULT_CONFIG: &str = r#"# AstroSync Configuration

[storage]
db_path = "offline.db"
cleanup_interval_secs = 3600

[sync]
api_base_url = "http://localhost:3000"
request_timeout_ms = 30000
background_interval_secs = 300
settle_delay_ms = 2000

[network]
assume_online = true

[logging]
verbose = false
json = false
"#;

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = Self::config_path(workspace_root);

        if !config_path.exists() {
            return Ok(Self {
                root: workspace_root.to_path_buf(),
                ..Default::default()
            });
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| AstroError::ConfigError(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| AstroError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Path of the config file for a workspace root
    pub fn config_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Resolved database path
    pub fn db_path(&self) -> PathBuf {
        if self.storage.db_path.is_absolute() {
            self.storage.db_path.clone()
        } else {
            self.root.join(CONFIG_DIR).join(&self.storage.db_path)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sync.request_timeout_ms == 0 {
            return Err(AstroError::ConfigError(
                "sync.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.sync.background_interval_secs == 0 {
            return Err(AstroError::ConfigError(
                "sync.background_interval_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(0) = self.storage.max_records_per_partition {
            return Err(AstroError::ConfigError(
                "storage.max_records_per_partition must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the config directory and a default config file.
    ///
    /// Returns `false` if the config file already existed.
    pub fn init_workspace(workspace_root: &Path) -> anyhow::Result<bool> {
        let dir = workspace_root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {:?}", dir))?;

        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(false);
        }

        std::fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {:?}", config_path))?;
        Ok(true)
    }
}
