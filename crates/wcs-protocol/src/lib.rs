//! OGC Web Coverage Service client.
//!
//! Reads capabilities and coverage descriptions from a WCS endpoint and
//! builds GetCoverage URLs that return GeoTIFF on a requested grid.
//! Versions 1.0, 1.1 and 2.0 are understood for discovery. Retrieval
//! requests use the 1.0 shape.

pub mod capabilities;
pub mod error;
pub mod layer;
pub mod request;
pub mod service;
pub mod version;
mod xml;

pub use capabilities::{parse_capabilities, parse_describe_coverage};
pub use error::{Result, WcsError};
pub use layer::{LayerDescription, WcsBand, WcsLayer, LAYER_INFO_TTL};
pub use request::{build_retrieve_url, capabilities_url, describe_coverage_url};
pub use service::{WcsService, RETRIEVAL_VERSION};
pub use version::WcsVersion;
