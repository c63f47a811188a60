//! Search requests and the client-side spatio-temporal item filter.

use std::collections::HashSet;

use geo_common::{BoundingBox, CrsCode, GeoError, Geometry, Notification, TimeRange};
use projection::Transformer;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::StacItem;

/// Body of `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub collections: Vec<String>,
    pub bbox: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, filter: &ItemFilter, limit: usize) -> Self {
        let b = filter.bbox;
        Self {
            collections: vec![collection.into()],
            bbox: [b.min_x, b.min_y, b.max_x, b.max_y],
            datetime: filter.time.map(|t| t.to_interval_string()),
            limit,
        }
    }
}

/// Spatial window (WGS84) and optional time window items must intersect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemFilter {
    pub bbox: BoundingBox,
    pub time: Option<TimeRange>,
}

impl ItemFilter {
    /// Window of a target geometry, with its envelope taken to WGS84.
    pub fn from_geometry(geometry: &Geometry, segments: usize) -> Result<Self> {
        let space = geometry.require_space()?;
        let envelope = space.envelope()?;
        let to_wgs84 = Transformer::new(space.crs, CrsCode::Epsg4326).map_err(GeoError::from)?;
        Ok(Self {
            bbox: to_wgs84.transform_envelope(&envelope, segments),
            time: geometry.time().and_then(|t| t.extent),
        })
    }

    /// Footprints that only touch the window contribute no cells and are
    /// rejected. Under a time window, items without a timestamp are rejected.
    pub fn accepts(&self, item: &StacItem) -> bool {
        if !item.bbox.intersects(&self.bbox) {
            return false;
        }
        match (self.time, item.interval()) {
            (Some(window), Some((start, end))) => window.intersects(&start, &end),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    fn lacks_time(&self, item: &StacItem) -> bool {
        self.time.is_some() && item.interval().is_none()
    }
}

/// Parse and filter search results.
///
/// Malformed items, and undated items under a time window, are skipped with
/// a warning. Items repeated across pages are kept once.
pub fn filter_items(features: &[Value], filter: &ItemFilter, notifications: &mut Vec<Notification>) -> Vec<StacItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for feature in features {
        match StacItem::from_value(feature) {
            Ok(item) if filter.lacks_time(&item) && item.bbox.intersects(&filter.bbox) => {
                let notification = Notification::warning(format!(
                    "Skipping STAC item {}: no datetime to match the requested time window",
                    item.id
                ));
                notification.log();
                notifications.push(notification);
            }
            Ok(item) => {
                if filter.accepts(&item) && seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
            Err(e) => {
                let notification = Notification::warning(format!("Skipping STAC item: {}", e));
                notification.log();
                notifications.push(notification);
            }
        }
    }

    items
}
