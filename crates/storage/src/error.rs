//! Error types for the cache, fetchers and registry.

use coverage_processor::ProcessorError;
use geo_common::{ErrorCategory, GeoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The remote answered with a non-success status.
    #[error("Cannot access {url}: HTTP {status}")]
    Http { url: String, status: u16 },

    /// The request never produced a response.
    #[error("Cannot access {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Padding or decoding of a fetched file failed.
    #[error("Coverage processing failed: {0}")]
    Processing(#[from] ProcessorError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A background task was cancelled or panicked.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { .. } | Self::Fetch { .. } | Self::Timeout(_) => ErrorCategory::Access,
            Self::Io(_) | Self::Task(_) => ErrorCategory::Data,
            Self::Processing(err) => err.category(),
            Self::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert a transport error for `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::fetch(url, err.to_string())
        }
    }
}

impl From<StorageError> for GeoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Processing(inner) => inner.into(),
            StorageError::Timeout(url) => GeoError::Timeout(url),
            StorageError::Config(msg) => GeoError::invalid_parameter("cache", msg),
            other if other.category() == ErrorCategory::Access => GeoError::Access(other.to_string()),
            other => GeoError::Io(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
