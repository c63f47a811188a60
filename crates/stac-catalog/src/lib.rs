//! SpatioTemporal Asset Catalog client.
//!
//! Resolves a collection to its root catalog, searches the catalog for
//! items over a target geometry, and merges one asset of every matching
//! item into a single coverage on the target grid.
//!
//! ```text
//! collection ──root link──► catalog ──POST search (+ next pages)──► items
//!                                                                     │
//!                            ItemFilter (bbox + time, dedupe) ◄───────┘
//!                                     │
//!                     SUBSTITUTE? sort by date (stable)
//!                                     │
//!             read asset ─► resample to grid ─► mask nodata ─► MergeMode::apply
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod merge;
pub mod models;
pub mod reader;
pub mod search;

pub use catalog::{CatalogCoverage, CatalogSearch};
pub use client::StacClient;
pub use config::StacConfig;
pub use error::{Result, StacError};
pub use media::{classify, value_type, AssetKind};
pub use merge::{sort_by_date, MergeMode};
pub use models::{Asset, Link, StacCatalog, StacCollection, StacItem, StacKind};
pub use reader::{AssetReader, HttpAssetReader};
pub use search::{filter_items, ItemFilter, SearchRequest};
