//! Two-stage resampling of a source coverage onto a target grid.
//!
//! Stage 1 subsets the source to the target envelope (expressed in the
//! source CRS) at native resolution. Stage 2 regrids that subset to the
//! target shape and CRS. Going envelope-first keeps the second stage from
//! aliasing when the source covers a much larger extent than requested.

use rayon::prelude::*;
use tracing::{debug, instrument};

use geo_common::{BoundingBox, CrsCode, Geometry, GridShape};
use projection::Transformer;

use crate::config::CoverageProcessorConfig;
use crate::error::Result;
use crate::interpolation::Interpolation;
use crate::types::{Band, Coverage};

/// Reconciles a coverage's native grid, CRS and envelope with a requested grid.
#[derive(Debug, Clone, Default)]
pub struct CoverageResampler {
    config: CoverageProcessorConfig,
}

impl CoverageResampler {
    pub fn new(config: CoverageProcessorConfig) -> Self {
        Self { config }
    }

    /// Resample `source` onto the grid of `target`.
    ///
    /// The target must carry exactly one regular 2-D space dimension.
    /// Cells of the result with no source coverage are NaN; nodata values of
    /// the source are masked to NaN before interpolation.
    #[instrument(skip_all, fields(kernel = %interpolation))]
    pub fn contextualize(
        &self,
        source: &Coverage,
        target: &Geometry,
        interpolation: Interpolation,
    ) -> Result<Coverage> {
        let (space, shape) = target.require_grid()?;
        let envelope = space.envelope()?;
        let target_crs = space.crs;

        if source.matches_grid(&envelope, target_crs, shape) {
            debug!("Source already on target grid");
            return Ok(source.clone());
        }

        let to_source = Transformer::new(target_crs, source.crs)?;
        let epsilon = self.config.nodata_epsilon;

        // Stage 1: subset to the requested envelope at native resolution
        let native_envelope = to_source.transform_envelope(&envelope, self.config.envelope_segments);
        let subset_shape = subset_shape(source, &native_envelope, shape);
        let native = Transformer::new(source.crs, source.crs)?;

        let subset_bands = source
            .bands
            .iter()
            .map(|band| {
                let masked = band.masked(epsilon);
                let data = regrid(
                    source,
                    &masked,
                    &native_envelope,
                    subset_shape,
                    interpolation,
                    &native,
                    f64::NAN,
                );
                derived_band(band, data)
            })
            .collect();
        let subset = Coverage::new(
            subset_shape.width,
            subset_shape.height,
            native_envelope,
            source.crs,
            subset_bands,
        )?;

        debug!(
            subset_width = subset_shape.width,
            subset_height = subset_shape.height,
            "Stage 1 subset complete"
        );

        // Stage 2: regrid to the target shape and CRS
        let bands = subset
            .bands
            .iter()
            .zip(&source.bands)
            .map(|(band, original)| {
                let data = regrid(
                    &subset,
                    &band.data,
                    &envelope,
                    shape,
                    interpolation,
                    &to_source,
                    f64::NAN,
                );
                derived_band(original, data)
            })
            .collect();

        Coverage::new(shape.width, shape.height, envelope, target_crs, bands)
    }
}

/// Shape of the stage 1 grid: native cell size over `envelope`, never larger
/// than the bigger of the source and target grids along each axis.
fn subset_shape(source: &Coverage, envelope: &BoundingBox, target: GridShape) -> GridShape {
    let (dx, dy) = source.cell_size();
    let width = (envelope.width() / dx).ceil();
    let height = (envelope.height() / dy).ceil();

    let max_width = source.width.max(target.width);
    let max_height = source.height.max(target.height);

    GridShape::new(
        clamp_dim(width, max_width),
        clamp_dim(height, max_height),
    )
}

fn clamp_dim(value: f64, max: usize) -> usize {
    if value.is_finite() && value >= 1.0 {
        (value as usize).min(max)
    } else {
        1
    }
}

fn derived_band(original: &Band, data: Vec<f64>) -> Band {
    Band {
        name: original.name.clone(),
        data,
        nodata: original.nodata.clone(),
        valid_range: original.valid_range,
    }
}

/// Sample `data` (laid out on `source`'s grid) at every cell center of a new
/// grid over `envelope`. Cell centers are mapped into the source CRS with
/// `to_source`; centers that fall off the source get `outside`.
pub(crate) fn regrid(
    source: &Coverage,
    data: &[f64],
    envelope: &BoundingBox,
    shape: GridShape,
    kernel: Interpolation,
    to_source: &Transformer,
    outside: f64,
) -> Vec<f64> {
    let dx = envelope.width() / shape.width as f64;
    let dy = envelope.height() / shape.height as f64;
    let mut output = vec![outside; shape.cell_count()];

    output
        .par_chunks_mut(shape.width)
        .enumerate()
        .for_each(|(row, out_row)| {
            let y = envelope.max_y - (row as f64 + 0.5) * dy;
            for (col, out) in out_row.iter_mut().enumerate() {
                let x = envelope.min_x + (col as f64 + 0.5) * dx;
                let (sx, sy) = to_source.transform(x, y);
                if let Some((px, py)) = source.pixel_position(sx, sy) {
                    *out = kernel.sample(data, source.width, source.height, px, py);
                }
            }
        });

    output
}

/// Pixel grid of `target` if it carries one, for callers that only need the
/// shape and CRS.
pub fn target_grid(target: &Geometry) -> Result<(BoundingBox, CrsCode, GridShape)> {
    let (space, shape) = target.require_grid()?;
    Ok((space.envelope()?, space.crs, shape))
}
