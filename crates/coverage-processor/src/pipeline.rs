//! Resample-then-encode, the tail shared by every source kind.

use geo_common::Geometry;

use crate::config::CoverageProcessorConfig;
use crate::encoder::{CellEncoder, EncodeOptions, Scanner};
use crate::error::Result;
use crate::interpolation::Interpolation;
use crate::resample::CoverageResampler;
use crate::types::Coverage;

#[derive(Debug, Clone, Default)]
pub struct CoveragePipeline {
    resampler: CoverageResampler,
    encoder: CellEncoder,
}

impl CoveragePipeline {
    pub fn new(config: CoverageProcessorConfig) -> Self {
        Self {
            resampler: CoverageResampler::new(config.clone()),
            encoder: CellEncoder::new(config),
        }
    }

    /// Bring `source` onto the grid of `target` and write its cells into `scanner`.
    pub fn run(
        &self,
        source: &Coverage,
        target: &Geometry,
        interpolation: Interpolation,
        options: &EncodeOptions,
        scanner: &mut dyn Scanner,
    ) -> Result<()> {
        let resampled = self.resampler.contextualize(source, target, interpolation)?;
        self.encoder.encode(&resampled, target, options, scanner)
    }
}
