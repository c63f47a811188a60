//! Coordinate reference system transformations.
//!
//! Implements the projections the pipeline can resolve from scratch:
//! geographic coordinates (EPSG:4326, EPSG:4269, CRS:84, treated as
//! equivalent) and spherical Web Mercator (EPSG:3857). Transforms involving
//! any other code are refused, except the identity.

pub mod mercator;
pub mod transform;

pub use mercator::WebMercator;
pub use transform::Transformer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("no transform available from {from} to {to}")]
    Unsupported { from: String, to: String },

    #[error("coordinate ({x}, {y}) is outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },
}

impl From<ProjectionError> for geo_common::GeoError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Unsupported { .. } => geo_common::GeoError::InvalidCrs(err.to_string()),
            ProjectionError::OutOfDomain { .. } => {
                geo_common::GeoError::InvalidData(err.to_string())
            }
        }
    }
}
