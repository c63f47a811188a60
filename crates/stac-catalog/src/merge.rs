//! Combining several items' rasters into one grid.

use std::fmt;
use std::str::FromStr;

use geo_common::Notification;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StacError};
use crate::models::StacItem;

/// How overlapping items are combined, cell by cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Valid values accumulate.
    #[default]
    Sum,
    /// Items are applied oldest first; the latest valid value wins.
    Substitute,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Substitute => "substitute",
        }
    }

    /// Fold one layer into the accumulated grid. NaN cells of `layer` leave
    /// `merged` untouched.
    pub fn apply(&self, merged: &mut [f64], layer: &[f64]) {
        for (target, &value) in merged.iter_mut().zip(layer) {
            if value.is_nan() {
                continue;
            }
            *target = match self {
                Self::Sum if !target.is_nan() => *target + value,
                _ => value,
            };
        }
    }
}

impl FromStr for MergeMode {
    type Err = StacError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "substitute" => Ok(Self::Substitute),
            _ => Err(StacError::UnknownMergeMode(s.to_string())),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable sort by timestamp, oldest first.
///
/// Every item must have a timestamp. Returns the debug notification naming
/// the first and last instants.
pub fn sort_by_date(items: &mut [StacItem]) -> Result<Notification> {
    if items.iter().any(|item| item.timestamp().is_none()) {
        return Err(StacError::MissingTimestamp);
    }
    items.sort_by_key(|item| item.timestamp());

    let first = items.first().and_then(StacItem::timestamp);
    let last = items.last().and_then(StacItem::timestamp);
    let format = |t: Option<chrono::DateTime<chrono::Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
    Ok(Notification::debug(format!(
        "Ordered STAC items. First: [{}]; Last [{}]",
        format(first),
        format(last)
    )))
}
