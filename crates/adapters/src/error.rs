//! Error types for the adapters crate.

use coverage_processor::ProcessorError;
use geo_common::{ErrorCategory, GeoError};
use stac_catalog::StacError;
use storage::StorageError;
use thiserror::Error;
use wcs_protocol::WcsError;

/// Errors raised while validating or contextualizing a resource.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("No adapter registered for '{0}'")]
    UnknownAdapter(String),

    /// A resource that fails validation.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Process execution at {url} failed: {message}")]
    Process { url: String, message: String },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Wcs(#[from] WcsError),

    #[error(transparent)]
    Stac(#[from] StacError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Processing(#[from] ProcessorError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn process(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter { .. }
            | Self::UnknownAdapter(_)
            | Self::InvalidResource(_)
            | Self::Unsupported(_) => ErrorCategory::Configuration,
            Self::Process { .. } => ErrorCategory::Access,
            Self::Task(_) | Self::Io(_) => ErrorCategory::Data,
            Self::Wcs(err) => err.category(),
            Self::Stac(err) => err.category(),
            Self::Storage(err) => err.category(),
            Self::Processing(err) => err.category(),
            Self::Geo(err) => err.category(),
        }
    }
}

impl From<AdapterError> for GeoError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::MissingParameter(name) => GeoError::MissingParameter(name),
            AdapterError::InvalidParameter { param, message } => GeoError::invalid_parameter(param, message),
            AdapterError::Unsupported(msg) => GeoError::Unsupported(msg),
            AdapterError::Wcs(inner) => inner.into(),
            AdapterError::Stac(inner) => inner.into(),
            AdapterError::Storage(inner) => inner.into(),
            AdapterError::Processing(inner) => inner.into(),
            AdapterError::Geo(inner) => inner,
            other @ (AdapterError::UnknownAdapter(_) | AdapterError::InvalidResource(_)) => {
                GeoError::invalid_parameter("adapter", other.to_string())
            }
            other @ AdapterError::Process { .. } => GeoError::Access(other.to_string()),
            other => GeoError::Io(other.to_string()),
        }
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
