//! Long-lived shared state for the contextualization pipeline.
//!
//! Provides:
//! - [`CoverageCache`]: weight-bounded on-disk cache of fetched coverages,
//!   single-flight per key, padded to the requested extent on load
//! - [`CoverageFetcher`] and its HTTP implementation
//! - [`ServiceRegistry`]: injected table of connected remote services

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod registry;

pub use cache::{CacheKey, CacheStats, CoverageCache};
pub use config::{CoverageCacheConfig, HttpConfig};
pub use error::{Result, StorageError};
pub use fetcher::{CoverageFetcher, HttpCoverageFetcher};
pub use registry::ServiceRegistry;
