//! Configuration management for the KaaS project engine
//!
//! Settings are resolved from, in order of increasing priority:
//! 1. Default values
//! 2. Configuration file (TOML format)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder substituted into the credential secret pattern
pub const WORKSPACE_ID_PLACEHOLDER: &str = "{workspace_id}";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KaasConfig {
    /// Metadata store
    pub database: DatabaseConfig,
    /// Host cluster and tenant credential lookup
    pub cluster: ClusterConfig,
    /// Logging
    pub logging: LoggingConfig,
    /// Activity retention
    pub activity: ActivityConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite:///var/lib/kaas/kaas.db")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Cluster access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubeconfig for the host cluster; in-cluster or default config when unset
    pub host_kubeconfig: Option<PathBuf>,
    /// Namespace on the host cluster holding per-workspace credentials
    pub control_namespace: String,
    /// Secret name pattern (use {workspace_id} as placeholder)
    pub credential_secret_pattern: String,
    /// Data key of the kubeconfig inside the credential secret
    pub credential_secret_key: String,
    /// Upper bound for a single cluster call
    pub request_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Enable file logging
    pub file_logging_enabled: bool,
    /// Emit console output as JSON
    pub json_format: bool,
    /// File rotation: hourly, daily or never
    pub rotation: String,
}

/// Longest retention accepted for the activity log (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Activity log retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Entries older than this many days are pruned
    pub retention_days: i64,
    /// Seconds between retention sweeps
    pub cleanup_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///var/lib/kaas/kaas.db".to_string(),
            max_connections: 16,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host_kubeconfig: None,
            control_namespace: "kaas-system".to_string(),
            credential_secret_pattern: "vc-{workspace_id}-kubeconfig".to_string(),
            credential_secret_key: "config".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("/var/log/kaas"),
            file_logging_enabled: false,
            json_format: false,
            rotation: "daily".to_string(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            cleanup_interval_secs: 3600,
        }
    }
}

impl KaasConfig {
    /// Load configuration from the first config file found, then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("KAAS_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("/etc/kaas/config.toml")),
            Some(PathBuf::from("./kaas.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Database
        if let Ok(url) = std::env::var("KAAS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(max) = std::env::var("KAAS_DATABASE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                self.database.max_connections = max;
            }
        }

        // Cluster
        if let Ok(path) = std::env::var("KAAS_HOST_KUBECONFIG") {
            self.cluster.host_kubeconfig = Some(PathBuf::from(path));
        }
        if let Ok(ns) = std::env::var("KAAS_CONTROL_NAMESPACE") {
            self.cluster.control_namespace = ns;
        }
        if let Ok(pattern) = std::env::var("KAAS_CREDENTIAL_SECRET_PATTERN") {
            self.cluster.credential_secret_pattern = pattern;
        }
        if let Ok(key) = std::env::var("KAAS_CREDENTIAL_SECRET_KEY") {
            self.cluster.credential_secret_key = key;
        }
        if let Ok(secs) = std::env::var("KAAS_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.cluster.request_timeout_secs = secs;
            }
        }

        // Logging
        if let Ok(level) = std::env::var("KAAS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(path) = std::env::var("KAAS_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(path);
        }
        if let Ok(enabled) = std::env::var("KAAS_FILE_LOGGING") {
            self.logging.file_logging_enabled = enabled.parse().unwrap_or(true);
        }
        if let Ok(json) = std::env::var("KAAS_LOG_JSON") {
            self.logging.json_format = json.parse().unwrap_or(false);
        }

        // Activity
        if let Ok(days) = std::env::var("KAAS_ACTIVITY_RETENTION_DAYS") {
            if let Ok(days) = days.parse() {
                self.activity.retention_days = days;
            }
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("Database URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if !self.cluster.credential_secret_pattern.contains(WORKSPACE_ID_PLACEHOLDER) {
            return Err(ConfigError::Validation(
                "Credential secret pattern must contain {workspace_id} placeholder".to_string(),
            ));
        }

        if self.cluster.control_namespace.is_empty() {
            return Err(ConfigError::Validation("Control namespace cannot be empty".to_string()));
        }

        if self.cluster.credential_secret_key.is_empty() {
            return Err(ConfigError::Validation("Credential secret key cannot be empty".to_string()));
        }

        if self.cluster.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("Request timeout cannot be 0".to_string()));
        }

        if self.activity.retention_days <= 0 {
            return Err(ConfigError::Validation(
                "Activity retention must be at least one day".to_string(),
            ));
        }

        if self.activity.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Validation(format!(
                "Activity retention must not exceed {} days",
                MAX_RETENTION_DAYS
            )));
        }

        if !matches!(self.logging.rotation.as_str(), "hourly" | "daily" | "never") {
            return Err(ConfigError::Validation(format!(
                "Unknown log rotation '{}'",
                self.logging.rotation
            )));
        }

        Ok(())
    }
}

impl ClusterConfig {
    /// Name of the credential secret for a workspace
    pub fn credential_secret_name(&self, workspace_id: &str) -> String {
        self.credential_secret_pattern.replace(WORKSPACE_ID_PLACEHOLDER, workspace_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ActivityConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file {0:?}: {1}")]
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// Configuration validation failed
    #[error("Config validation failed: {0}")]
    Validation(String),
}
