//! Per-cell reductions across the bands of a coverage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reduction applied to the band vector of a cell.
///
/// All operations skip NaN entries. When every entry is NaN the sum is 0.0
/// and every other operation yields NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandMixing {
    MaxValue,
    MinValue,
    AvgValue,
    SumValue,
    /// 0-based index of the band holding the maximum.
    BandMaxValue,
    /// 0-based index of the band holding the minimum.
    BandMinValue,
}

impl BandMixing {
    pub const ALL: [BandMixing; 6] = [
        BandMixing::MaxValue,
        BandMixing::MinValue,
        BandMixing::AvgValue,
        BandMixing::SumValue,
        BandMixing::BandMaxValue,
        BandMixing::BandMinValue,
    ];

    /// Parse a mixer label (case-insensitive). Returns `None` for unknown names.
    pub fn from_str(s: &str) -> Option<Self> {
        let label = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|op| op.as_str() == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxValue => "max_value",
            Self::MinValue => "min_value",
            Self::AvgValue => "avg_value",
            Self::SumValue => "sum_value",
            Self::BandMaxValue => "band_max_value",
            Self::BandMinValue => "band_min_value",
        }
    }

    /// Reduce one cell's band values.
    pub fn apply(&self, values: &[f64]) -> f64 {
        let valid = values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| !v.is_nan());

        match self {
            Self::MaxValue => valid.map(|(_, v)| v).reduce(f64::max).unwrap_or(f64::NAN),
            Self::MinValue => valid.map(|(_, v)| v).reduce(f64::min).unwrap_or(f64::NAN),
            Self::SumValue => valid.map(|(_, v)| v).sum::<f64>(),
            Self::AvgValue => {
                let (sum, count) = valid.fold((0.0, 0usize), |(s, n), (_, v)| (s + v, n + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            }
            // First band wins ties
            Self::BandMaxValue => valid
                .reduce(|best, cur| if cur.1 > best.1 { cur } else { best })
                .map(|(i, _)| i as f64)
                .unwrap_or(f64::NAN),
            Self::BandMinValue => valid
                .reduce(|best, cur| if cur.1 < best.1 { cur } else { best })
                .map(|(i, _)| i as f64)
                .unwrap_or(f64::NAN),
        }
    }
}

impl fmt::Display for BandMixing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
