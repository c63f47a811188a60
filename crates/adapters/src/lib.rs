//! Source adapters and the contextualization entry point.
//!
//! A [`Resource`] names an adapter tag and carries resolved parameters. The
//! [`AdapterRegistry`] maps tags to [`ResourceAdapter`] implementations,
//! each providing encode, type inference and validation:
//!
//! | tag       | source                                   |
//! |-----------|------------------------------------------|
//! | `raster`  | local GeoTIFF file                       |
//! | `wcs`     | layer of an OGC Web Coverage Service     |
//! | `stac`    | asset merged across STAC collection items |
//! | `process` | GeoTIFF produced by a remote process job |
//!
//! Every adapter ends in the same tail: resample onto the request grid and
//! encode cell by cell into a [`coverage_processor::Scanner`].
//!
//! ```ignore
//! let context = Arc::new(AdapterContext::new(&http, cache, processor, stac)?);
//! let contextualizer = Contextualizer::new(AdapterRegistry::with_defaults(context));
//! let data = contextualizer.contextualize(&resource, &request).await?;
//! ```

pub mod adapter;
pub mod context;
pub mod error;
pub mod params;
pub mod process;
pub mod raster;
pub mod stac;
pub mod wcs;

pub use adapter::{AdapterRegistry, ContextRequest, Resource, ResourceAdapter};
pub use context::{AdapterContext, Contextualizer};
pub use error::{AdapterError, Result};
pub use params::ResourceParameters;
pub use process::ProcessAdapter;
pub use raster::RasterAdapter;
pub use stac::StacAdapter;
pub use wcs::WcsAdapter;
