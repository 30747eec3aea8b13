//! Configuration management for convlog
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ConvlogError, Result};
use anyhow::Context;
use crate::store::{DEFAULT_QUERY_LIMIT, DEFAULT_ROTATION_THRESHOLD_BYTES, DEFAULT_SESSION_LIMIT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for convlog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where and how partitions are written
    #[serde(default)]
    pub storage: StorageConfig,
    /// Default result limits
    #[serde(default)]
    pub query: QueryConfig,
    /// Diagnostic logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Partition storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for partition files
    ///
    /// When unset, a per-user data directory is used (see
    /// [`StorageConfig::resolved_log_dir`]).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Partition size (bytes) above which it is rotated aside
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold_bytes: u64,
}

fn default_rotation_threshold() -> u64 {
    DEFAULT_ROTATION_THRESHOLD_BYTES
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            rotation_threshold_bytes: default_rotation_threshold(),
        }
    }
}

impl StorageConfig {
    /// Log directory to use: the configured one, else the per-user default
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

/// Per-user default log directory
///
/// `<data dir>/logs` as reported by `directories`, or `./logs` when no home
/// directory can be determined.
pub fn default_log_dir() -> PathBuf {
    ProjectDirs::from("com", "convlog", "convlog")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Default result limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Entries returned by a query when no limit is given
    #[serde(default = "default_query_limit")]
    pub default_limit: usize,

    /// Sessions returned by a listing when no limit is given
    #[serde(default = "default_session_limit")]
    pub default_session_limit: usize,
}

fn default_query_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

fn default_session_limit() -> usize {
    DEFAULT_SESSION_LIMIT
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            default_session_limit: default_session_limit(),
        }
    }
}

/// Diagnostic logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `convlog=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also write logs to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConvlogError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(ConvlogError::Yaml)
            .with_context(|| format!("Failed to parse config {}", path))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(dir) = std::env::var("CONVLOG_LOG_DIR") {
            if !dir.is_empty() {
                tracing::debug!(log_dir = %dir, "Env override: CONVLOG_LOG_DIR");
                self.storage.log_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(threshold) = std::env::var("CONVLOG_ROTATION_THRESHOLD_BYTES") {
            match threshold.parse::<u64>() {
                Ok(v) => self.storage.rotation_threshold_bytes = v,
                Err(_) => {
                    tracing::warn!("Invalid CONVLOG_ROTATION_THRESHOLD_BYTES: {}", threshold)
                }
            }
        }

        if let Ok(limit) = std::env::var("CONVLOG_QUERY_LIMIT") {
            match limit.parse::<usize>() {
                Ok(v) => self.query.default_limit = v,
                Err(_) => tracing::warn!("Invalid CONVLOG_QUERY_LIMIT: {}", limit),
            }
        }

        if let Ok(limit) = std::env::var("CONVLOG_SESSION_LIMIT") {
            match limit.parse::<usize>() {
                Ok(v) => self.query.default_session_limit = v,
                Err(_) => tracing::warn!("Invalid CONVLOG_SESSION_LIMIT: {}", limit),
            }
        }

        if let Ok(level) = std::env::var("CONVLOG_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("CONVLOG_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => tracing::warn!("Invalid value for CONVLOG_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(dir) = &cli.log_dir {
            self.storage.log_dir = Some(dir.clone());
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.storage.rotation_threshold_bytes == 0 {
            return Err(ConvlogError::Config(
                "storage.rotation_threshold_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.query.default_limit == 0 {
            return Err(ConvlogError::Config(
                "query.default_limit must be greater than 0".to_string(),
            )
            .into());
        }

        if self.query.default_session_limit == 0 {
            return Err(ConvlogError::Config(
                "query.default_session_limit must be greater than 0".to_string(),
            )
            .into());
        }

        if self.logging.level.trim().is_empty() {
            return Err(
                ConvlogError::Config("logging.level cannot be empty".to_string()).into(),
            );
        }

        if let Some(dir) = &self.storage.log_dir {
            if dir.as_os_str().is_empty() {
                return Err(
                    ConvlogError::Config("storage.log_dir cannot be empty".to_string()).into(),
                );
            }
        }

        Ok(())
    }
}
