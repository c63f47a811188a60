//! Configuration for coverage processing.

use serde::{Deserialize, Serialize};

/// Numeric knobs of the resampling and encoding stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageProcessorConfig {
    /// Sample magnitudes beyond this are treated as NaN before nodata checks.
    pub magnitude_limit: f64,

    /// Relative tolerance of nodata equality.
    pub nodata_epsilon: f64,

    /// Absolute envelope-area difference (CRS units) above which a fetched
    /// coverage is padded to the requested region.
    pub area_tolerance: f64,

    /// Points per edge when transforming envelopes between CRSs.
    pub envelope_segments: usize,
}

impl Default for CoverageProcessorConfig {
    fn default() -> Self {
        Self {
            magnitude_limit: 1.0e35,
            nodata_epsilon: 1.0e-9,
            area_tolerance: 0.01,
            envelope_segments: 16,
        }
    }
}

impl CoverageProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COVERAGE_MAGNITUDE_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.magnitude_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("COVERAGE_NODATA_EPSILON") {
            if let Ok(eps) = val.parse() {
                config.nodata_epsilon = eps;
            }
        }

        if let Ok(val) = std::env::var("COVERAGE_AREA_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.area_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("COVERAGE_ENVELOPE_SEGMENTS") {
            if let Ok(n) = val.parse() {
                config.envelope_segments = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.magnitude_limit > 0.0) {
            return Err("magnitude_limit must be > 0".to_string());
        }

        if !(self.nodata_epsilon >= 0.0) {
            return Err("nodata_epsilon must be >= 0".to_string());
        }

        if !(self.area_tolerance >= 0.0) {
            return Err("area_tolerance must be >= 0".to_string());
        }

        if self.envelope_segments == 0 {
            return Err("envelope_segments must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoverageProcessorConfig::default();
        assert_eq!(config.magnitude_limit, 1.0e35);
        assert_eq!(config.nodata_epsilon, 1.0e-9);
        assert_eq!(config.area_tolerance, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CoverageProcessorConfig::default();
        config.magnitude_limit = 0.0;
        assert!(config.validate().is_err());

        config = CoverageProcessorConfig::default();
        config.nodata_epsilon = f64::NAN;
        assert!(config.validate().is_err());

        config = CoverageProcessorConfig::default();
        config.area_tolerance = -1.0;
        assert!(config.validate().is_err());

        config = CoverageProcessorConfig::default();
        config.envelope_segments = 0;
        assert!(config.validate().is_err());
    }
}
