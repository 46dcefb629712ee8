//! Configuration management for the Amplify log archiver

use crate::adaptive_fetcher::{FetchPolicy, RetryPolicy};
use crate::error::{ArchiveError, Result};
use crate::range_generator::RangeGenerator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level archiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Applications whose access logs are archived
    #[serde(default)]
    pub applications: Vec<AppConfig>,

    /// Base URL of the log API (default: `https://amplify.<region>.amazonaws.com`)
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Length of each candidate chunk in days (default: 14)
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u32,

    /// Days of history covered when no explicit dates are given (default: 365)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Split and retry behaviour
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Where payloads are persisted
    #[serde(default)]
    pub storage: StorageConfig,

    /// Path of the JSON run report (default: "amplify_logs_results.json")
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

/// One hosted application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Amplify application id
    pub app_id: String,
    /// Domain whose access logs are requested
    pub domain_name: String,
    /// Name used in storage keys and reports
    pub app_name: String,
    /// Region hosting the application
    pub region: String,
}

/// Split and retry behaviour of the fetcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Maximum bisection depth (default: 3)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Attempts per range for transient failures (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds, doubled per attempt (default: 2000)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delay between the halves of a split in milliseconds (default: 1000)
    #[serde(default = "default_pause_ms")]
    pub split_delay_ms: u64,

    /// Delay between top-level chunks in milliseconds (default: 1000)
    #[serde(default = "default_pause_ms")]
    pub chunk_delay_ms: u64,

    /// HTTP request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Backend type (default: "file")
    /// Options: "file" (local directory) or "object_store" (HTTP PUT)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Root directory for the file backend (default: "amplify_logs")
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Bucket name for the object store backend
    #[serde(default)]
    pub bucket: Option<String>,

    /// Object store base URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Key prefix prepended to every artifact key (default: "")
    #[serde(default)]
    pub prefix: String,

    /// Upload attempts per artifact for the object store (default: 3)
    #[serde(default = "default_upload_attempts")]
    pub upload_attempts: u32,
}

// Default value functions for serde
fn default_chunk_days() -> u32 {
    14
}

fn default_retention_days() -> u32 {
    365
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_backend() -> String {
    "file".to_string()
}

fn default_output_dir() -> String {
    "amplify_logs".to_string()
}

fn default_upload_attempts() -> u32 {
    3
}

fn default_report_path() -> String {
    "amplify_logs_results.json".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            max_depth: default_max_depth(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            split_delay_ms: default_pause_ms(),
            chunk_delay_ms: default_pause_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FetchConfig {
    /// Largest accepted bisection depth
    pub const MAX_SPLIT_DEPTH: u32 = 10;

    /// Build the fetcher policy described by this configuration
    pub fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_depth: self.max_depth,
            retry: RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.base_delay_ms),
            ),
            split_delay: Duration::from_millis(self.split_delay_ms),
        }
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the fetch configuration
    ///
    /// # Validation Rules
    /// - max_depth must not exceed 10
    /// - max_attempts must be > 0
    /// - request_timeout_secs must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.max_depth > Self::MAX_SPLIT_DEPTH {
            return Err(ArchiveError::ConfigError(format!(
                "fetch.max_depth must be at most {}, got {}",
                Self::MAX_SPLIT_DEPTH,
                self.max_depth
            )));
        }

        if self.max_attempts == 0 {
            return Err(ArchiveError::ConfigError(
                "fetch.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ArchiveError::ConfigError(
                "fetch.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: default_backend(),
            output_dir: default_output_dir(),
            bucket: None,
            endpoint: None,
            prefix: String::new(),
            upload_attempts: default_upload_attempts(),
        }
    }
}

impl StorageConfig {
    /// Validate the storage configuration
    pub fn validate(&self) -> Result<()> {
        match self.backend.as_str() {
            "file" => {
                if self.output_dir.is_empty() {
                    return Err(ArchiveError::ConfigError(
                        "storage.output_dir must not be empty".to_string(),
                    ));
                }
            }
            "object_store" => {
                if self.bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(ArchiveError::ConfigError(
                        "storage.bucket is required when backend is 'object_store'".to_string(),
                    ));
                }
                if self.endpoint.as_deref().map_or(true, str::is_empty) {
                    return Err(ArchiveError::ConfigError(
                        "storage.endpoint is required when backend is 'object_store'".to_string(),
                    ));
                }
                if self.upload_attempts == 0 {
                    return Err(ArchiveError::ConfigError(
                        "storage.upload_attempts must be greater than 0".to_string(),
                    ));
                }
            }
            other => {
                return Err(ArchiveError::ConfigError(format!(
                    "Invalid storage backend '{}', must be 'file' or 'object_store'",
                    other
                )));
            }
        }

        Ok(())
    }
}

impl AppConfig {
    /// Validate that every field is set
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("app_id", &self.app_id),
            ("domain_name", &self.domain_name),
            ("app_name", &self.app_name),
            ("region", &self.region),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ArchiveError::ConfigError(format!(
                    "Missing required app parameter: {}",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            applications: Vec::new(),
            api_endpoint: None,
            chunk_days: default_chunk_days(),
            retention_days: default_retention_days(),
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
            report_path: default_report_path(),
        }
    }
}

impl ArchiveConfig {
    /// Longest accepted retention window (a century)
    pub const MAX_RETENTION_DAYS: u32 = 36_500;

    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(ArchiveConfig)` if loading and validation succeed
    /// * `Err(ArchiveError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ArchiveError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ArchiveConfig = serde_yaml::from_str(content).map_err(|e| {
            ArchiveError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - at least one application, each fully specified, with unique names
    /// - chunk_days must be in 1..=3650 and retention_days in 1..=36500
    /// - fetch and storage sections must be valid
    pub fn validate(&self) -> Result<()> {
        if self.applications.is_empty() {
            return Err(ArchiveError::ConfigError(
                "at least one application must be configured".to_string(),
            ));
        }

        for (i, app) in self.applications.iter().enumerate() {
            app.validate()?;
            if self.applications[..i]
                .iter()
                .any(|other| other.app_name == app.app_name)
            {
                return Err(ArchiveError::ConfigError(format!(
                    "duplicate app_name '{}'",
                    app.app_name
                )));
            }
        }

        if self.chunk_days == 0 {
            return Err(ArchiveError::ConfigError(
                "chunk_days must be greater than 0".to_string(),
            ));
        }

        if self.chunk_days > RangeGenerator::MAX_CHUNK_DAYS {
            return Err(ArchiveError::ConfigError(format!(
                "chunk_days must be at most {}, got {}",
                RangeGenerator::MAX_CHUNK_DAYS,
                self.chunk_days
            )));
        }

        if self.retention_days == 0 {
            return Err(ArchiveError::ConfigError(
                "retention_days must be greater than 0".to_string(),
            ));
        }

        if self.retention_days > Self::MAX_RETENTION_DAYS {
            return Err(ArchiveError::ConfigError(format!(
                "retention_days must be at most {}, got {}",
                Self::MAX_RETENTION_DAYS,
                self.retention_days
            )));
        }

        if self.report_path.is_empty() {
            return Err(ArchiveError::ConfigError(
                "report_path must not be empty".to_string(),
            ));
        }

        self.fetch.validate()?;
        self.storage.validate()?;

        Ok(())
    }

    /// Find a configured application by name
    pub fn for_app(&self, app_name: &str) -> Result<&AppConfig> {
        self.applications
            .iter()
            .find(|app| app.app_name == app_name)
            .ok_or_else(|| {
                ArchiveError::ConfigError(format!("unknown application '{}'", app_name))
            })
    }

    /// Log API base URL for an application
    pub fn api_endpoint_for(&self, app: &AppConfig) -> String {
        match &self.api_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://amplify.{}.amazonaws.com", app.region),
        }
    }
}
