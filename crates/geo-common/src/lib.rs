//! Common types shared by every crate of the raster contextualizer.
//!
//! The geometry types here are consumed as inputs: a caller describes the
//! scale it wants data for (a 2-D grid in some projection, optionally a time
//! window) and the processing crates reconcile source coverages with it.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod notification;
pub mod observable;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{CrsCode, CrsParseError};
pub use error::{ErrorCategory, GeoError, GeoResult};
pub use geometry::{Dimension, Geometry, GridShape, SpaceDimension, TimeDimension};
pub use notification::{Notification, NotificationLevel};
pub use observable::{ObservableKind, ValueType};
pub use time::{parse_iso8601, TimeParseError, TimeRange};
