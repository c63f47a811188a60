//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoundingBox;

/// Half the equatorial circumference of the Web Mercator sphere, in meters.
pub const WEB_MERCATOR_MAX_EXTENT: f64 = 20037508.342789244;

/// CRS codes understood by the pipeline.
///
/// Geographic systems and Web Mercator can be transformed natively. Any other
/// EPSG code is carried through as `Other` and is considered unresolved: it can
/// be named in requests but not reprojected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    Epsg4326,
    /// NAD83 Geographic
    Epsg4269,
    /// WGS84 with lon/lat axis order
    Crs84,
    /// Web Mercator (meters)
    Epsg3857,
    /// Any other EPSG code
    Other(u32),
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326" / "epsg:4326"
    /// - "CRS:84"
    /// - "urn:ogc:def:crs:EPSG::4326" and versioned variants
    /// - "http://www.opengis.net/def/crs/EPSG/0/4326"
    pub fn from_code_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        if normalized == "CRS:84" || normalized.ends_with(":CRS84") || normalized.ends_with("/CRS84")
        {
            return Ok(CrsCode::Crs84);
        }

        let code = if let Some(rest) = normalized.strip_prefix("EPSG:") {
            rest
        } else if normalized.starts_with("URN:OGC:DEF:CRS:EPSG:")
            || normalized.contains("/EPSG/")
        {
            normalized
                .rsplit(|c| c == ':' || c == '/')
                .next()
                .unwrap_or_default()
        } else {
            return Err(CrsParseError::UnsupportedCrs(s.to_string()));
        };

        let code: u32 = code
            .parse()
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))?;
        Ok(Self::from_epsg(code))
    }

    /// Map a numeric EPSG code.
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => CrsCode::Epsg4326,
            4269 => CrsCode::Epsg4269,
            3857 | 900913 | 3785 => CrsCode::Epsg3857,
            other => CrsCode::Other(other),
        }
    }

    /// Numeric EPSG code. CRS:84 reports 4326.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 | CrsCode::Crs84 => 4326,
            CrsCode::Epsg4269 => 4269,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Other(code) => *code,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269 | CrsCode::Crs84)
    }

    /// Whether the code resolves to a concrete projection we can compute with.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, CrsCode::Other(_))
    }

    /// The domain of validity of the CRS, if known.
    pub fn valid_bounds(&self) -> Option<BoundingBox> {
        match self {
            CrsCode::Epsg4326 | CrsCode::Epsg4269 | CrsCode::Crs84 => {
                Some(BoundingBox::new(-180.0, -90.0, 180.0, 90.0))
            }
            CrsCode::Epsg3857 => Some(BoundingBox::new(
                -WEB_MERCATOR_MAX_EXTENT,
                -WEB_MERCATOR_MAX_EXTENT,
                WEB_MERCATOR_MAX_EXTENT,
                WEB_MERCATOR_MAX_EXTENT,
            )),
            CrsCode::Other(_) => None,
        }
    }

    /// Extent of the (x, y) axes. Unresolved codes are assumed metric and
    /// reuse the Web Mercator extent.
    pub fn axis_extent(&self) -> (f64, f64) {
        match self.valid_bounds() {
            Some(bounds) => (bounds.width(), bounds.height()),
            None => (2.0 * WEB_MERCATOR_MAX_EXTENT, 2.0 * WEB_MERCATOR_MAX_EXTENT),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsCode::Crs84 => write!(f, "CRS:84"),
            other => write!(f, "EPSG:{}", other.epsg()),
        }
    }
}

impl std::str::FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code_string(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
