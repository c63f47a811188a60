//! Cell-by-cell encoding of a resampled coverage into an output scanner.
//!
//! For every target cell the encoder:
//! 1. reads the raw sample of the selected band, or reduces all bands with a
//!    [`BandMixing`] operation;
//! 2. turns magnitudes above the configured limit into NaN;
//! 3. turns values matching the nodata set into NaN;
//! 4. runs the optional [`ValueTransform`] on valid values.
//!
//! Per-cell problems never abort the scan; they become NaN cells and,
//! where useful, a notification on the scanner.

pub mod band_mixing;
pub mod output;
pub mod transform;

use std::sync::Arc;

use tracing::{debug, instrument};

use geo_common::{Geometry, Notification};

use crate::config::CoverageProcessorConfig;
use crate::error::{ProcessorError, Result};
use crate::resample::target_grid;
use crate::types::{nodata_matches, Coverage};

pub use band_mixing::BandMixing;
pub use output::{DataBuilder, EncodedData, Scanner};
pub use transform::{ExpressionTransform, ValueTransform, VALUE_VARIABLE};

/// Options controlling how cell values are produced.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Band read when no mixer is set.
    pub band: usize,
    /// Name of a [`BandMixing`] operation.
    pub band_mixer: Option<String>,
    /// Resource-level nodata values, merged with each band's own.
    pub nodata: Vec<f64>,
    pub transform: Option<Arc<dyn ValueTransform>>,
}

impl EncodeOptions {
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    pub fn with_band_mixer(mut self, mixer: impl Into<String>) -> Self {
        self.band_mixer = Some(mixer.into());
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata.push(nodata);
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn ValueTransform>) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// How raw values are read at a cell.
enum Reader<'a> {
    Band { data: &'a [f64] },
    Mixed { op: BandMixing, bands: Vec<Vec<f64>> },
    /// Unknown mixer name: every cell is NaN.
    Unavailable,
}

/// Writes a coverage's values into a [`Scanner`].
#[derive(Debug, Clone, Default)]
pub struct CellEncoder {
    config: CoverageProcessorConfig,
}

impl CellEncoder {
    pub fn new(config: CoverageProcessorConfig) -> Self {
        Self { config }
    }

    /// Encode `coverage`, which must already sit on the grid of `target`.
    ///
    /// Cells are visited column by column (x outer, y inner) and written at
    /// their row-major offset `y * width + x`. Exactly `width * height`
    /// values are written.
    #[instrument(skip_all, fields(band = options.band, mixer = ?options.band_mixer))]
    pub fn encode(
        &self,
        coverage: &Coverage,
        target: &Geometry,
        options: &EncodeOptions,
        scanner: &mut dyn Scanner,
    ) -> Result<()> {
        let (_, _, shape) = target_grid(target)?;
        if coverage.shape() != shape {
            return Err(ProcessorError::GridMismatch {
                coverage: format!("{}x{}", coverage.width, coverage.height),
                target: format!("{}x{}", shape.width, shape.height),
            });
        }

        let epsilon = self.config.nodata_epsilon;
        let limit = self.config.magnitude_limit;
        let mut nodata = options.nodata.clone();

        let reader = match options.band_mixer.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match BandMixing::from_str(name) {
                Some(op) => Reader::Mixed {
                    op,
                    // Each band's own nodata is removed before mixing
                    bands: coverage.bands.iter().map(|b| b.masked(epsilon)).collect(),
                },
                None => {
                    scanner.notify(Notification::warning(format!(
                        "Unsupported band mixing operation {}",
                        name
                    )));
                    Reader::Unavailable
                }
            },
            _ => {
                let band = coverage.band(options.band)?;
                nodata.extend(band.nodata.iter().copied());
                Reader::Band { data: &band.data }
            }
        };

        let mut mixed = vec![0.0; coverage.band_count()];
        let mut transform_failures = 0usize;

        for x in 0..shape.width {
            for y in 0..shape.height {
                let offset = y * shape.width + x;

                let mut value = match &reader {
                    Reader::Band { data } => data[offset],
                    Reader::Mixed { op, bands } => {
                        for (slot, band) in mixed.iter_mut().zip(bands) {
                            *slot = band[offset];
                        }
                        op.apply(&mixed)
                    }
                    Reader::Unavailable => f64::NAN,
                };

                if value.abs() > limit {
                    value = f64::NAN;
                }

                if !value.is_nan() && nodata_matches(value, &nodata, epsilon) {
                    value = f64::NAN;
                }

                if let Some(transform) = &options.transform {
                    if !value.is_nan() {
                        value = transform.apply(value).unwrap_or_else(|| {
                            transform_failures += 1;
                            f64::NAN
                        });
                    }
                }

                scanner.set(offset, value);
            }
        }

        if transform_failures > 0 {
            scanner.notify(Notification::debug(format!(
                "Transform produced no number for {} cell(s)",
                transform_failures
            )));
        }

        debug!(cells = shape.cell_count(), "Encoded coverage");
        Ok(())
    }
}
