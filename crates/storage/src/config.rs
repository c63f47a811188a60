//! Configuration for the coverage cache and HTTP clients.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StorageError};

/// Cache directory and weight limit.
#[derive(Debug, Clone)]
pub struct CoverageCacheConfig {
    /// Where fetched coverage files are written.
    pub directory: PathBuf,
    /// Total size of cached files, in megabytes.
    pub max_weight_mb: u64,
    /// Kept for parity with segment-locked caches; loads are serialized per key.
    pub concurrency_level: usize,
}

impl Default for CoverageCacheConfig {
    fn default() -> Self {
        Self {
            directory: env::temp_dir().join("coverage-cache"),
            max_weight_mb: 100,
            concurrency_level: 1,
        }
    }
}

impl CoverageCacheConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            directory: env::var("COVERAGE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            max_weight_mb: env::var("COVERAGE_CACHE_MAX_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_weight_mb),
            concurrency_level: defaults.concurrency_level,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_max_weight_mb(mut self, max_weight_mb: u64) -> Self {
        self.max_weight_mb = max_weight_mb;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_weight_mb * 1024 * 1024
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_weight_mb == 0 {
            return Err("max_weight_mb must be > 0".to_string());
        }
        if self.directory.as_os_str().is_empty() {
            return Err("cache directory must be set".to_string());
        }
        Ok(())
    }
}

/// Timeouts shared by every HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("raster-contextualizer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        Self {
            request_timeout: secs("HTTP_TIMEOUT_SECS", defaults.request_timeout),
            connect_timeout: secs("HTTP_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            user_agent: defaults.user_agent,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("request_timeout must be > 0".to_string());
        }
        if self.connect_timeout > self.request_timeout {
            return Err("connect_timeout must not exceed request_timeout".to_string());
        }
        Ok(())
    }

    /// Build a client with these timeouts.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| StorageError::config(format!("Failed to create HTTP client: {}", e)))
    }
}
