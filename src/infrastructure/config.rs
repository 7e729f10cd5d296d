//! Configuration infrastructure
//!
//! Contains configuration loading and management for player collection runs.
//!
//! Configuration is organized into sections:
//! 1. Server endpoints (`server`)
//! 2. Crawling limits and HTTP behaviour (`crawling`)
//! 3. Retry/backoff policies (`retry`)
//! 4. Cache and report file locations (`storage`)
//! 5. Logging (`logging`)
//!
//! The value is built once at process start and handed down to every component.

#![allow(clippy::derivable_impls)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game server endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Enumeration and fetch behaviour
    #[serde(default)]
    pub crawling: CrawlingConfig,

    /// Retry policies for login and page/profile fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Snapshot and report locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Game server endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://serverchichi.online`
    pub base_url: String,

    /// Login form endpoint (POST)
    pub login_path: String,

    /// Paginated player search endpoint (POST)
    pub search_path: String,

    /// Profile page prefix; the nickname is appended as a path segment (GET)
    pub profile_path: String,
}

/// Crawling specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlingConfig {
    /// Number of players returned per search page
    pub page_size: u32,

    /// Enumeration stops once the offset goes past this value
    pub max_offset: u32,

    /// Maximum concurrent profile tasks and outbound connections
    pub max_concurrent_requests: usize,

    /// Upper bound for a single network call in seconds
    pub request_timeout_seconds: u64,

    /// Request pacing (0 disables the rate limiter)
    pub max_requests_per_second: u32,

    /// User agent string
    pub user_agent: String,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

/// Exponential backoff settings for one class of call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Multiplier applied to `2^(attempt-1)` seconds
    pub multiplier: u64,

    /// Lower bound of a single delay in seconds
    pub min_delay_seconds: u64,

    /// Upper bound of a single delay in seconds
    pub max_delay_seconds: u64,
}

/// Retry configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub login: BackoffConfig,
    pub fetch: BackoffConfig,
}

/// Snapshot and report file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot of previously collected records
    pub cache_file: PathBuf,

    /// Rendered HTML report
    pub report_file: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for the log file (defaults to the working directory)
    pub log_dir: Option<PathBuf>,

    /// Log file name inside `log_dir`
    pub log_file_name: String,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            crawling: CrawlingConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            login_path: defaults::LOGIN_PATH.to_string(),
            search_path: defaults::SEARCH_PATH.to_string(),
            profile_path: defaults::PROFILE_PATH.to_string(),
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::PAGE_SIZE,
            max_offset: defaults::MAX_OFFSET,
            max_concurrent_requests: defaults::MAX_CONCURRENT_REQUESTS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            follow_redirects: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            login: BackoffConfig {
                max_attempts: defaults::RETRY_ATTEMPTS,
                multiplier: 1,
                min_delay_seconds: defaults::LOGIN_MIN_DELAY_SECONDS,
                max_delay_seconds: defaults::LOGIN_MAX_DELAY_SECONDS,
            },
            fetch: BackoffConfig {
                max_attempts: defaults::RETRY_ATTEMPTS,
                multiplier: 1,
                min_delay_seconds: defaults::FETCH_MIN_DELAY_SECONDS,
                max_delay_seconds: defaults::FETCH_MAX_DELAY_SECONDS,
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(defaults::CACHE_FILE),
            report_file: PathBuf::from(defaults::REPORT_FILE),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            log_file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("player-census");

        Ok(config_dir)
    }

    /// Configuration manager for the default per-user location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("config.json");
        Ok(Self { config_path })
    }

    /// Configuration manager for an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { config_path: path.into() }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file is invalid: {}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                // Keep the broken file around for inspection
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    /// Game server base URL
    pub const BASE_URL: &str = "https://serverchichi.online";

    pub const LOGIN_PATH: &str = "/account/auth";
    pub const SEARCH_PATH: &str = "/players/search";
    pub const PROFILE_PATH: &str = "/player/";

    /// Players per search page (fixed by the server)
    pub const PAGE_SIZE: u32 = 50;

    /// Default enumeration ceiling
    pub const MAX_OFFSET: u32 = 500;

    /// Default admission limit for profile tasks
    pub const MAX_CONCURRENT_REQUESTS: usize = 5;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default request pacing
    pub const MAX_REQUESTS_PER_SECOND: u32 = 10;

    pub const USER_AGENT: &str = "player-census/0.1";

    /// Attempts per call, first attempt included
    pub const RETRY_ATTEMPTS: u32 = 3;

    pub const LOGIN_MIN_DELAY_SECONDS: u64 = 2;
    pub const LOGIN_MAX_DELAY_SECONDS: u64 = 10;
    pub const FETCH_MIN_DELAY_SECONDS: u64 = 1;
    pub const FETCH_MAX_DELAY_SECONDS: u64 = 5;

    pub const CACHE_FILE: &str = "player_data.json";
    pub const REPORT_FILE: &str = "players_report.html";

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "app.log";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_limits() {
        let config = AppConfig::default();
        assert_eq!(config.crawling.page_size, 50);
        assert_eq!(config.crawling.max_offset, 500);
        assert_eq!(config.crawling.max_concurrent_requests, 5);
        assert_eq!(config.retry.login.min_delay_seconds, 2);
        assert_eq!(config.retry.login.max_delay_seconds, 10);
        assert_eq!(config.retry.fetch.min_delay_seconds, 1);
        assert_eq!(config.retry.fetch.max_delay_seconds, 5);
        assert_eq!(config.retry.fetch.max_attempts, 3);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let config: AppConfig =
            serde_json::from_str(r#"{"storage": {"cache_file": "a.json", "report_file": "b.html"}}"#)
                .unwrap();
        assert_eq!(config.storage.cache_file, PathBuf::from("a.json"));
        assert_eq!(config.crawling.page_size, defaults::PAGE_SIZE);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let config = manager.load_config().await.unwrap();
        assert_eq!(config.crawling.max_offset, defaults::MAX_OFFSET);
        assert!(manager.config_path().exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_backed_up_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let manager = ConfigManager::with_path(&path);
        let config = manager.load_config().await.unwrap();

        assert_eq!(config.crawling.page_size, defaults::PAGE_SIZE);
        assert!(dir.path().join("config.json.corrupted").exists());
    }
}
