//! STAC client errors.

use coverage_processor::ProcessorError;
use geo_common::{ErrorCategory, GeoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StacError {
    // === Configuration ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown merge mode '{0}'")]
    UnknownMergeMode(String),

    #[error("Not implemented: {0}")]
    Unsupported(String),

    // === Access ===
    #[error("Cannot access the {kind} at {url}")]
    Access { kind: String, url: String },

    #[error("Data at {url} is not a valid STAC {kind}")]
    InvalidType { kind: String, url: String },

    #[error("{0}")]
    MissingLink(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    // === Data ===
    #[error("No STAC items found for this context.")]
    NoItems,

    #[error("STAC items lack a timestamp and could not be sorted by date.")]
    MissingTimestamp,

    #[error("Invalid STAC data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Processing(#[from] ProcessorError),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl StacError {
    pub fn access(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Access {
            kind: kind.into(),
            url: url.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn from_reqwest(kind: &str, url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else {
            tracing::debug!(url = %url, error = %err, "STAC request failed");
            Self::access(kind, url)
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingParameter(_) | Self::UnknownMergeMode(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::Access { .. }
            | Self::InvalidType { .. }
            | Self::MissingLink(_)
            | Self::Timeout(_) => ErrorCategory::Access,
            Self::NoItems | Self::MissingTimestamp | Self::InvalidData(_) => ErrorCategory::Data,
            Self::Processing(err) => err.category(),
            Self::Geo(err) => err.category(),
        }
    }
}

impl From<StacError> for GeoError {
    fn from(err: StacError) -> Self {
        match err {
            StacError::Geo(inner) => inner,
            StacError::Processing(inner) => inner.into(),
            StacError::MissingParameter(name) => GeoError::MissingParameter(name),
            StacError::UnknownMergeMode(value) => GeoError::invalid_parameter("merge", value),
            StacError::Unsupported(message) => GeoError::Unsupported(message),
            StacError::Timeout(url) => GeoError::Timeout(url),
            other @ StacError::NoItems => GeoError::NoData(other.to_string()),
            other @ (StacError::MissingTimestamp | StacError::InvalidData(_)) => {
                GeoError::InvalidData(other.to_string())
            }
            other => GeoError::Access(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StacError>;
