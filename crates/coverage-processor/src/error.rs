//! Error types for coverage processing.

use geo_common::{ErrorCategory, GeoError};
use thiserror::Error;

/// Errors that can occur while processing a coverage.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Failed to decode a raster file.
    #[error("failed to decode coverage: {0}")]
    DecodeFailed(String),

    /// Failed to encode a raster file.
    #[error("failed to encode coverage: {0}")]
    EncodeFailed(String),

    /// Invalid georeferencing or band metadata.
    #[error("invalid coverage metadata: {0}")]
    InvalidMetadata(String),

    /// The coverage grid does not match the target grid.
    #[error("coverage grid {coverage} does not match target grid {target}")]
    GridMismatch { coverage: String, target: String },

    /// A band index outside the coverage.
    #[error("band {band} requested but coverage has {available} band(s)")]
    InvalidBand { band: usize, available: usize },

    /// Unknown option value (interpolation, band mixer).
    #[error("unknown {kind} '{value}'")]
    UnknownOption { kind: &'static str, value: String },

    /// A transform expression that does not compile.
    #[error("invalid transform expression '{expression}': {message}")]
    InvalidTransform { expression: String, message: String },

    /// Observable kind that has no interpolation default.
    #[error("no default interpolation for observable kind '{0}'")]
    NoDefaultInterpolation(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Geometry, CRS or other shared failure.
    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl ProcessorError {
    /// Create a DecodeFailed error.
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Create an EncodeFailed error.
    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create an UnknownOption error.
    pub fn unknown_option(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownOption {
            kind,
            value: value.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DecodeFailed(_)
            | Self::EncodeFailed(_)
            | Self::InvalidMetadata(_)
            | Self::StorageError(_) => ErrorCategory::Data,
            Self::GridMismatch { .. }
            | Self::InvalidBand { .. }
            | Self::UnknownOption { .. }
            | Self::InvalidTransform { .. }
            | Self::NoDefaultInterpolation(_) => ErrorCategory::Configuration,
            Self::Geo(err) => err.category(),
        }
    }
}

impl From<std::io::Error> for ProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<tiff::TiffError> for ProcessorError {
    fn from(err: tiff::TiffError) -> Self {
        Self::DecodeFailed(err.to_string())
    }
}

impl From<projection::ProjectionError> for ProcessorError {
    fn from(err: projection::ProjectionError) -> Self {
        Self::Geo(err.into())
    }
}

impl From<ProcessorError> for GeoError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Geo(inner) => inner,
            ProcessorError::StorageError(msg) => GeoError::Io(msg),
            ProcessorError::UnknownOption { kind, value } => {
                GeoError::invalid_parameter(kind, format!("unknown value '{}'", value))
            }
            other => match other.category() {
                ErrorCategory::Configuration => GeoError::invalid_parameter("coverage", other.to_string()),
                ErrorCategory::Access => GeoError::Access(other.to_string()),
                ErrorCategory::Data => GeoError::InvalidData(other.to_string()),
            },
        }
    }
}

/// Result type for coverage processor operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            ProcessorError::decode_failed("truncated").category(),
            ErrorCategory::Data
        );
        assert_eq!(
            ProcessorError::InvalidBand { band: 3, available: 1 }.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ProcessorError::Geo(GeoError::access("http://example.org")).category(),
            ErrorCategory::Access
        );
    }

    #[test]
    fn test_into_geo_error_keeps_category() {
        let geo: GeoError = ProcessorError::unknown_option("interpolation", "cubic3").into();
        assert_eq!(geo.category(), ErrorCategory::Configuration);
        assert!(geo.to_string().contains("cubic3"));

        let geo: GeoError = ProcessorError::decode_failed("bad header").into();
        assert_eq!(geo.category(), ErrorCategory::Data);
    }
}
