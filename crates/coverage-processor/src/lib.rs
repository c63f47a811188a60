//! Coverage processing for raster contextualization.
//!
//! Takes a coverage fetched from a file, a WCS layer or a STAC item and
//! brings it onto the grid a caller asked for:
//!
//! - **Padding**: fix up services that return a slightly different extent
//! - **Resampling**: two-stage subset + regrid with a selectable kernel
//! - **Encoding**: band selection or mixing, nodata filtering and value
//!   transforms, written cell by cell into a [`Scanner`]
//!
//! # Architecture
//!
//! ```text
//! fetched GeoTIFF
//!      │
//!      ▼
//! GridTransform::adjust_file(path, geometry)
//!      │
//!      └─► area differs by > tolerance? pad/crop, rewrite file
//!               │
//!               ▼
//! read_geotiff ─► Coverage
//!      │
//!      ▼
//! CoverageResampler::contextualize(coverage, geometry, kernel)
//!      │
//!      ├─► Stage 1: subset to envelope at native resolution
//!      │
//!      └─► Stage 2: regrid to target shape and CRS
//!               │
//!               ▼
//! CellEncoder::encode(coverage, geometry, options, scanner)
//!      │
//!      └─► raw/mixed value ─► magnitude shield ─► nodata ─► transform
//! ```
//!
//! # Example
//!
//! ```ignore
//! use coverage_processor::{read_geotiff, CoveragePipeline, DataBuilder, EncodeOptions, Interpolation};
//! use geo_common::Geometry;
//!
//! let geometry = Geometry::parse("S2(934,631){bbox=[-75.22 -72.67 3.56 5.30],proj=EPSG:4326}")?;
//! let coverage = read_geotiff("dem.tif")?;
//!
//! let mut builder = DataBuilder::new(geometry.require_grid()?.1);
//! CoveragePipeline::default().run(
//!     &coverage,
//!     &geometry,
//!     Interpolation::Bilinear,
//!     &EncodeOptions::default().with_nodata(-9999.0),
//!     &mut builder,
//! )?;
//! let data = builder.build();
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod geotiff;
pub mod interpolation;
pub mod padding;
pub mod pipeline;
pub mod resample;
pub mod types;

// Re-export commonly used types at crate root
pub use config::CoverageProcessorConfig;
pub use encoder::{
    BandMixing, CellEncoder, DataBuilder, EncodeOptions, EncodedData, ExpressionTransform,
    Scanner, ValueTransform,
};
pub use error::{ProcessorError, Result};
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use interpolation::Interpolation;
pub use padding::{Adjustment, GridTransform};
pub use pipeline::CoveragePipeline;
pub use resample::{target_grid, CoverageResampler};
pub use types::{envelopes_equal, nodata_matches, Band, Coverage};
