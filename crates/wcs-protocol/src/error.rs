//! WCS client errors.

use geo_common::{ErrorCategory, GeoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WcsError {
    #[error("Invalid WCS version '{0}'")]
    InvalidVersion(String),

    #[error("WCS version {0} is not supported")]
    UnsupportedVersion(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Layer '{layer}' is not offered by {url}")]
    LayerNotFound { layer: String, url: String },

    #[error("Cannot access {url}: HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Cannot access {url}: {message}")]
    Request { url: String, message: String },

    #[error("Request to {0} timed out")]
    Timeout(String),

    /// The service answered with an OGC exception report.
    #[error("Service {url} reported an exception: {message}")]
    ServiceException { url: String, message: String },

    #[error("Malformed WCS response: {0}")]
    Xml(String),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl WcsError {
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidVersion(_)
            | Self::UnsupportedVersion(_)
            | Self::MissingParameter(_)
            | Self::LayerNotFound { .. } => ErrorCategory::Configuration,
            Self::Http { .. }
            | Self::Request { .. }
            | Self::Timeout(_)
            | Self::ServiceException { .. }
            | Self::Xml(_) => ErrorCategory::Access,
            Self::Geo(err) => err.category(),
        }
    }
}

impl From<WcsError> for GeoError {
    fn from(err: WcsError) -> Self {
        match err {
            WcsError::Geo(inner) => inner,
            WcsError::UnsupportedVersion(version) => {
                GeoError::Unsupported(format!("WCS version {}", version))
            }
            WcsError::MissingParameter(name) => GeoError::MissingParameter(name),
            WcsError::Timeout(url) => GeoError::Timeout(url),
            other if other.category() == ErrorCategory::Configuration => {
                GeoError::invalid_parameter("wcs", other.to_string())
            }
            other => GeoError::Access(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WcsError>;
