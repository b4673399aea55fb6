//! Configuration management for the report uploader.
//!
//! Loads configuration from TOML file with environment variable overrides.
//! The resulting [`Config`] is read once at startup and passed by reference;
//! nothing below `main` reads the environment.

use crate::{Result, UploaderError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "REPORT_UPLOADER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analytics: AnalyticsConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Base URL of the analytics service
    pub server_url: String,

    /// Account email used to request the access token
    pub email: String,

    /// Account password used to request the access token
    pub password: String,

    /// Project the uploaded reports belong to
    pub project_id: i64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Root directory scanned for logs and HAR files
    pub path: PathBuf,

    /// Where the completion manifest is written
    pub upload_info_file_path: PathBuf,

    /// Maximum concurrent uploads
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per file transfer (including the first)
    pub max_attempts: u32,

    /// Base delay for exponential backoff
    pub base_delay_ms: u64,

    /// Upper bound on backoff delay
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

// Default values
fn default_server_url() -> String {
    "https://analytics.katalon.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_upload_info_file_path() -> PathBuf {
    PathBuf::from("upload-info.json")
}

fn default_max_workers() -> usize {
    32
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            email: String::new(),
            password: String::new(),
            project_id: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            upload_info_file_path: default_upload_info_file_path(),
            max_workers: default_max_workers(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AnalyticsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UploaderError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| UploaderError::Config(e.to_string()))
    }

    /// Apply `REPORT_UPLOADER_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from an arbitrary lookup keyed by the unprefixed variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SERVER_URL") {
            self.analytics.server_url = v;
        }
        if let Some(v) = lookup("EMAIL") {
            self.analytics.email = v;
        }
        if let Some(v) = lookup("PASSWORD") {
            self.analytics.password = v;
        }
        if let Some(v) = lookup("PROJECT_ID") {
            self.analytics.project_id = v.trim().parse().map_err(|_| {
                UploaderError::Config(format!("{}PROJECT_ID must be an integer, got {:?}", ENV_PREFIX, v))
            })?;
        }
        if let Some(v) = lookup("PATH") {
            self.upload.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("UPLOAD_INFO_FILE_PATH") {
            self.upload.upload_info_file_path = PathBuf::from(v);
        }
        Ok(())
    }

    /// Reject configurations a run cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.upload.path.as_os_str().is_empty() {
            return Err(UploaderError::Config("upload.path is required".to_string()));
        }
        if self.analytics.email.trim().is_empty() {
            return Err(UploaderError::Config("analytics.email is required".to_string()));
        }
        if self.analytics.server_url.trim().is_empty() {
            return Err(UploaderError::Config("analytics.server_url is required".to_string()));
        }
        if self.upload.max_workers == 0 {
            return Err(UploaderError::Config("upload.max_workers must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(UploaderError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}
