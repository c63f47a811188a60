//! Extent reconciliation for fetched coverages.
//!
//! Services do not always return exactly the region that was asked for.
//! [`GridTransform::adjust`] compares the requested and received envelope
//! areas and, when they differ by more than the configured tolerance, pads
//! or crops the coverage onto the requested region and grid.
//! Cells outside the received data are filled with the band's nodata value.

use std::path::Path;

use tracing::{debug, instrument};

use geo_common::{BoundingBox, Geometry, GridShape, Notification};
use projection::Transformer;

use crate::config::CoverageProcessorConfig;
use crate::error::Result;
use crate::geotiff::{read_geotiff, write_geotiff};
use crate::interpolation::Interpolation;
use crate::resample::regrid;
use crate::types::{Band, Coverage};

/// Outcome of an [`GridTransform::adjust`] call.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub coverage: Coverage,
    /// Whether the coverage was rebuilt.
    pub changed: bool,
    /// Set when the adjustment had to be skipped for a reason worth reporting.
    pub notification: Option<Notification>,
}

impl Adjustment {
    fn unchanged(coverage: Coverage) -> Self {
        Self {
            coverage,
            changed: false,
            notification: None,
        }
    }

    fn skipped(coverage: Coverage, message: String) -> Self {
        let notification = Notification::warning(message);
        notification.log();
        Self {
            coverage,
            changed: false,
            notification: Some(notification),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridTransform {
    config: CoverageProcessorConfig,
}

impl GridTransform {
    pub fn new(config: CoverageProcessorConfig) -> Self {
        Self { config }
    }

    /// Make the coverage's extent match the requested envelope of `target`.
    ///
    /// Areas are compared in the coverage CRS with planar units. Unresolved
    /// CRSs leave the coverage unchanged and report a warning.
    #[instrument(skip_all)]
    pub fn adjust(&self, coverage: Coverage, target: &Geometry) -> Result<Adjustment> {
        let space = target.require_space()?;
        let envelope = space.envelope()?;

        if !coverage.crs.is_resolved() || !space.crs.is_resolved() {
            let message = format!(
                "Cannot resolve projection {}; extent of the received coverage was not adjusted",
                if coverage.crs.is_resolved() { space.crs } else { coverage.crs }
            );
            return Ok(Adjustment::skipped(coverage, message));
        }

        let to_coverage = Transformer::new(space.crs, coverage.crs)?;
        let requested = to_coverage.transform_envelope(&envelope, self.config.envelope_segments);

        let difference = (requested.area() - coverage.envelope.area()).abs();
        if difference <= self.config.area_tolerance {
            return Ok(Adjustment::unchanged(coverage));
        }

        let shape = padded_shape(&coverage, &requested, target);
        debug!(
            difference = difference,
            width = shape.width,
            height = shape.height,
            "Padding coverage to requested extent"
        );

        let native = Transformer::new(coverage.crs, coverage.crs)?;
        let bands = coverage
            .bands
            .iter()
            .map(|band| {
                let fill = band.nodata.first().copied().unwrap_or(f64::NAN);
                let data = regrid(
                    &coverage,
                    &band.data,
                    &requested,
                    shape,
                    Interpolation::Nearest,
                    &native,
                    fill,
                );
                Band {
                    name: band.name.clone(),
                    data,
                    nodata: band.nodata.clone(),
                    valid_range: band.valid_range,
                }
            })
            .collect();

        let padded = Coverage::new(shape.width, shape.height, requested, coverage.crs, bands)?;
        Ok(Adjustment {
            coverage: padded,
            changed: true,
            notification: None,
        })
    }

    /// Adjust a GeoTIFF on disk, rewriting the same file only when the
    /// coverage was rebuilt.
    pub fn adjust_file(&self, path: impl AsRef<Path>, target: &Geometry) -> Result<Adjustment> {
        let path = path.as_ref();
        let coverage = read_geotiff(path)?;
        let adjustment = self.adjust(coverage, target)?;
        if adjustment.changed {
            write_geotiff(&adjustment.coverage, path)?;
            debug!(path = %path.display(), "Rewrote padded coverage");
        }
        Ok(adjustment)
    }
}

/// Shape of the padded raster: the requested grid when it is expressed in
/// the coverage CRS, otherwise the coverage's own cell size over `envelope`.
fn padded_shape(coverage: &Coverage, envelope: &BoundingBox, target: &Geometry) -> GridShape {
    if let Ok((space, shape)) = target.require_grid() {
        let same_crs = space.crs == coverage.crs
            || (space.crs.is_geographic() && coverage.crs.is_geographic());
        if same_crs {
            return shape;
        }
    }

    let (dx, dy) = coverage.cell_size();
    let width = (envelope.width() / dx).round().max(1.0) as usize;
    let height = (envelope.height() / dy).round().max(1.0) as usize;
    GridShape::new(width, height)
}
