//! Error taxonomy shared across the contextualization pipeline.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing parameters. Never retried.
    Configuration,
    /// Remote service unreachable, non-2xx response, non-compliant metadata.
    Access,
    /// The data itself is unusable for the request.
    Data,
}

/// Primary error type for geometry and source access.
#[derive(Debug, Error)]
pub enum GeoError {
    // === Configuration Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Not implemented: {0}")]
    Unsupported(String),

    // === Access Errors ===
    #[error("Cannot access {0}")]
    Access(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    // === Data Errors ===
    #[error("No data: {0}")]
    NoData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl GeoError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an Access error.
    pub fn access(msg: impl Into<String>) -> Self {
        Self::Access(msg.into())
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoError::MissingParameter(_)
            | GeoError::InvalidParameter { .. }
            | GeoError::InvalidGeometry(_)
            | GeoError::InvalidCrs(_)
            | GeoError::Unsupported(_) => ErrorCategory::Configuration,

            GeoError::Access(_) | GeoError::Timeout(_) => ErrorCategory::Access,

            GeoError::NoData(_) | GeoError::InvalidData(_) | GeoError::Io(_) => {
                ErrorCategory::Data
            }
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GeoError::Timeout(_))
    }
}

impl From<std::io::Error> for GeoError {
    fn from(err: std::io::Error) -> Self {
        GeoError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::InvalidData(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            GeoError::MissingParameter("wcsIdentifier".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            GeoError::Unsupported("WCS 2.0.1".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            GeoError::access("http://example.org").category(),
            ErrorCategory::Access
        );
        assert_eq!(
            GeoError::NoData("no items".into()).category(),
            ErrorCategory::Data
        );
    }

    #[test]
    fn test_message_includes_parameter() {
        let err = GeoError::invalid_parameter("interpolation", "unknown kernel 'cubic3'");
        assert_eq!(
            err.to_string(),
            "Invalid parameter value for 'interpolation': unknown kernel 'cubic3'"
        );
        assert!(!err.is_retryable());
        assert!(GeoError::Timeout("GetCoverage".into()).is_retryable());
    }
}
