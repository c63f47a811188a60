//! Layer model for WCS coverages.

use std::time::{Duration, Instant};

use geo_common::{BoundingBox, CrsCode, Geometry, GridShape};
use serde::Serialize;

use crate::error::{Result, WcsError};

/// How long a coverage description stays valid before it is fetched again.
pub const LAYER_INFO_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// One band (range field) of a coverage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WcsBand {
    pub name: String,
    pub nodata: Vec<f64>,
    pub valid_range: Option<(f64, f64)>,
}

impl WcsBand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// What a DescribeCoverage response says about one coverage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerDescription {
    pub identifier: Option<String>,
    /// Native envelope and CRS, when the service reports one.
    pub envelope: Option<(BoundingBox, CrsCode)>,
    pub supported_crs: Vec<String>,
    /// Layer-wide nodata, used for bands without their own.
    pub nodata: Vec<f64>,
    pub bands: Vec<WcsBand>,
    pub grid_shape: Option<GridShape>,
}

/// A coverage offered by a WCS endpoint.
///
/// Built from the capabilities document; the description fields are filled
/// in by [`WcsLayer::apply`] once DescribeCoverage has been read.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsLayer {
    pub name: String,
    pub title: Option<String>,
    pub wgs84_envelope: Option<BoundingBox>,
    pub identifier: Option<String>,
    pub original_envelope: Option<BoundingBox>,
    pub original_crs: Option<CrsCode>,
    pub supported_crs: Vec<String>,
    pub nodata: Vec<f64>,
    pub bands: Vec<WcsBand>,
    pub grid_shape: Option<GridShape>,
    described_at: Option<Instant>,
}

impl WcsLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            wgs84_envelope: None,
            identifier: None,
            original_envelope: None,
            original_crs: None,
            supported_crs: Vec::new(),
            nodata: Vec::new(),
            bands: Vec::new(),
            grid_shape: None,
            described_at: None,
        }
    }

    pub fn with_wgs84_envelope(mut self, envelope: BoundingBox) -> Self {
        self.wgs84_envelope = Some(envelope);
        self
    }

    /// Merge a coverage description into the layer.
    ///
    /// The native envelope defaults to the WGS84 one from the capabilities.
    /// The identifier defaults to the layer name.
    pub fn apply(&mut self, description: LayerDescription) {
        self.identifier = description.identifier.or_else(|| Some(self.name.clone()));
        match description.envelope {
            Some((envelope, crs)) => {
                self.original_envelope = Some(envelope);
                self.original_crs = Some(crs);
            }
            None => {
                self.original_envelope = self.wgs84_envelope;
                self.original_crs = self.wgs84_envelope.map(|_| CrsCode::Epsg4326);
            }
        }
        self.supported_crs = description.supported_crs;
        self.nodata = description.nodata;
        self.bands = description.bands;
        self.grid_shape = description.grid_shape;
        self.described_at = Some(Instant::now());
    }

    /// Whether the description was read less than `ttl` ago.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.described_at
            .map(|at| at.elapsed() < ttl)
            .unwrap_or(false)
    }

    pub fn is_described(&self) -> bool {
        self.described_at.is_some()
    }

    /// Identifier to put in GetCoverage requests. Services that cannot carry
    /// `:` in layer names advertise `ns__name` for `ns:name`.
    pub fn request_identifier(&self) -> Result<String> {
        self.identifier
            .as_deref()
            .map(|id| id.replace("__", ":"))
            .ok_or_else(|| WcsError::MissingParameter(format!("identifier of layer {}", self.name)))
    }

    /// Nodata values for a band, falling back to the layer-wide set.
    pub fn nodata_for(&self, band: usize) -> &[f64] {
        match self.bands.get(band) {
            Some(b) => &b.nodata,
            None => &self.nodata,
        }
    }

    /// Native grid of the coverage, if the description gave enough to build one.
    ///
    /// Services reporting a north-first axis order get the WGS84 envelope.
    pub fn native_geometry(&self) -> Option<Geometry> {
        let shape = self.grid_shape?;
        let (envelope, crs) = match (self.original_envelope, self.original_crs) {
            (Some(envelope), Some(CrsCode::Epsg4326)) | (Some(envelope), Some(CrsCode::Crs84)) => {
                (self.wgs84_envelope.unwrap_or(envelope), CrsCode::Epsg4326)
            }
            (Some(envelope), Some(crs)) => (envelope, crs),
            _ => (self.wgs84_envelope?, CrsCode::Epsg4326),
        };
        Some(Geometry::grid(envelope, crs, shape.width, shape.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described() -> WcsLayer {
        let mut layer = WcsLayer::new("ns__dem").with_wgs84_envelope(BoundingBox::new(-10.0, -5.0, 10.0, 5.0));
        layer.apply(LayerDescription {
            identifier: Some("ns__dem".to_string()),
            nodata: vec![-9999.0],
            bands: vec![WcsBand {
                name: "elevation".to_string(),
                nodata: vec![-32768.0],
                valid_range: Some((-500.0, 9000.0)),
            }],
            grid_shape: Some(GridShape::new(200, 100)),
            ..LayerDescription::default()
        });
        layer
    }

    #[test]
    fn test_request_identifier_translates_namespace() {
        assert_eq!(described().request_identifier().unwrap(), "ns:dem");
    }

    #[test]
    fn test_undescribed_layer_has_no_identifier() {
        let layer = WcsLayer::new("dem");
        assert!(layer.request_identifier().is_err());
        assert!(!layer.is_fresh(LAYER_INFO_TTL));
    }

    #[test]
    fn test_identifier_defaults_to_name() {
        let mut layer = WcsLayer::new("dem");
        layer.apply(LayerDescription::default());
        assert_eq!(layer.identifier.as_deref(), Some("dem"));
        assert!(layer.is_described());
    }

    #[test]
    fn test_nodata_for_falls_back_to_layer() {
        let layer = described();
        assert_eq!(layer.nodata_for(0), &[-32768.0]);
        assert_eq!(layer.nodata_for(3), &[-9999.0]);
    }

    #[test]
    fn test_envelope_defaults_to_wgs84() {
        let layer = described();
        assert_eq!(layer.original_envelope, layer.wgs84_envelope);
        assert_eq!(layer.original_crs, Some(CrsCode::Epsg4326));
        assert!(layer.is_fresh(LAYER_INFO_TTL));
        assert!(!layer.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_native_geometry() {
        let geometry = described().native_geometry().unwrap();
        let (space, shape) = geometry.require_grid().unwrap();
        assert_eq!((shape.width, shape.height), (200, 100));
        assert_eq!(space.crs, CrsCode::Epsg4326);
        assert!(WcsLayer::new("x").native_geometry().is_none());
    }
}
