//! WCS protocol versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WcsError;

/// A `major.minor.patch` WCS version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WcsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl WcsVersion {
    pub const V1_0_0: WcsVersion = WcsVersion::new(1, 0, 0);
    pub const V1_1_0: WcsVersion = WcsVersion::new(1, 1, 0);
    pub const V2_0_1: WcsVersion = WcsVersion::new(2, 0, 1);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse `1`, `1.1` or `1.1.2`. Missing components are zero.
    pub fn parse(s: &str) -> Result<Self, WcsError> {
        let invalid = || WcsError::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, WcsError> {
            match parts.next() {
                Some(p) => p.trim().parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let version = Self::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }

    /// DescribeCoverage and GetCoverage use different parameter names before 2.0.
    pub fn is_v2(&self) -> bool {
        self.major >= 2
    }
}

impl Default for WcsVersion {
    fn default() -> Self {
        Self::V2_0_1
    }
}

impl fmt::Display for WcsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for WcsVersion {
    type Err = WcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        assert_eq!(WcsVersion::parse("2.0.1").unwrap(), WcsVersion::V2_0_1);
        assert_eq!(WcsVersion::parse(" 1.0.0 ").unwrap(), WcsVersion::V1_0_0);
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(WcsVersion::parse("1.1").unwrap(), WcsVersion::V1_1_0);
        assert_eq!(WcsVersion::parse("2").unwrap(), WcsVersion::new(2, 0, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(WcsVersion::parse("").is_err());
        assert!(WcsVersion::parse("two").is_err());
        assert!(WcsVersion::parse("1.0.0.0").is_err());
    }

    #[test]
    fn test_display_and_order() {
        assert_eq!(WcsVersion::V1_1_0.to_string(), "1.1.0");
        assert!(WcsVersion::V1_0_0 < WcsVersion::V2_0_1);
        assert!(WcsVersion::V2_0_1.is_v2());
        assert!(!WcsVersion::V1_1_0.is_v2());
    }
}
