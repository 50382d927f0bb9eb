//! Configuration file support for vlanbulk
//!
//! Loads and validates settings from a TOML file. A missing file yields the
//! defaults; command-line flags override individual values afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use vlanbulk_common::ConfigError;

use crate::dashboard::DEFAULT_BASE_URL;
use crate::ledger::DEFAULT_LEDGER_FILE;
use crate::pool::{WorkerPool, MAX_WORKERS};

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "vlanbulk.toml";

/// Where the ledger and audit log live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Rollback ledger file
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Audit log file
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
}

/// Bulk dispatch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Worker count (1-4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Delay between calls made by one worker, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

/// Dashboard API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Organization whose switches `--all-switches` and name lookups use;
    /// the first visible organization when unset
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// Complete vlanbulk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlanBulkConfig {
    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_FILE)
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("vlanChanges.log")
}

fn default_workers() -> usize {
    MAX_WORKERS
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "MERAKI_DASHBOARD_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            audit_log_path: default_audit_log_path(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
            organization_id: None,
        }
    }
}

impl Default for VlanBulkConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            dispatch: DispatchConfig::default(),
            dashboard: DashboardConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl VlanBulkConfig {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Get the pacing delay as Duration
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.dispatch.pacing_ms)
    }

    /// Get the request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.dashboard.request_timeout_secs)
    }

    /// Build the worker pool described by this config
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.dispatch.workers, self.pacing())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.workers == 0 || self.dispatch.workers > MAX_WORKERS {
            return Err(ConfigError::invalid(
                "dispatch.workers",
                format!("must be 1-{}", MAX_WORKERS),
            ));
        }

        if self.storage.ledger_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.ledger_path", "must not be empty"));
        }

        if self.storage.audit_log_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "storage.audit_log_path",
                "must not be empty",
            ));
        }

        let url = &self.dashboard.base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::invalid(
                "dashboard.base_url",
                "must be an http(s) URL",
            ));
        }

        if self.dashboard.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "dashboard.request_timeout_secs",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
