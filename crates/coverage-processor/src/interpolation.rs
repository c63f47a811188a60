//! Interpolation kernels for coverage resampling.
//!
//! Kernels take fractional pixel coordinates where cell centers sit on
//! integers. Callers are responsible for rejecting points outside the
//! raster; positions within half a cell of the border are clamped.

use serde::{Deserialize, Serialize};
use std::fmt;

use geo_common::ObservableKind;

use crate::error::{ProcessorError, Result};

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Value of the nearest cell.
    Nearest,
    /// Weighted mean of the four surrounding cells.
    Bilinear,
    /// Cubic convolution over 4x4 cells, a = -0.5.
    Bicubic,
    /// Cubic convolution over 4x4 cells, a = -1.0 (sharper).
    Bicubic2,
}

impl Interpolation {
    /// Parse from string (case-insensitive). Unknown names are a configuration error.
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "nearest-neighbor" | "nearest_neighbor" | "nearest neighbor" => {
                Ok(Self::Nearest)
            }
            "bilinear" => Ok(Self::Bilinear),
            "bicubic" => Ok(Self::Bicubic),
            "bicubic2" => Ok(Self::Bicubic2),
            _ => Err(ProcessorError::unknown_option("interpolation", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::Bicubic2 => "bicubic2",
        }
    }

    /// Default kernel for what is being observed: continuous quantities are
    /// smoothed, classes and flags must keep their exact values.
    pub fn default_for(kind: &ObservableKind) -> Result<Self> {
        match kind {
            ObservableKind::Quantity => Ok(Self::Bicubic),
            ObservableKind::Category | ObservableKind::Detection | ObservableKind::Verification => {
                Ok(Self::Nearest)
            }
            ObservableKind::Other(name) => Err(ProcessorError::NoDefaultInterpolation(name.clone())),
        }
    }

    /// Pick the kernel: explicit request parameter, then the resource
    /// default, then the observable-driven default.
    pub fn resolve(
        explicit: Option<&str>,
        resource_default: Option<&str>,
        kind: &ObservableKind,
    ) -> Result<Self> {
        if let Some(name) = explicit.filter(|s| !s.trim().is_empty()) {
            return Self::from_str(name);
        }
        if let Some(name) = resource_default.filter(|s| !s.trim().is_empty()) {
            return Self::from_str(name);
        }
        Self::default_for(kind)
    }

    /// Sample `data` at fractional pixel position (x, y).
    pub fn sample(&self, data: &[f64], width: usize, height: usize, x: f64, y: f64) -> f64 {
        match self {
            Self::Nearest => nearest_interpolate(data, width, height, x, y),
            Self::Bilinear => bilinear_interpolate(data, width, height, x, y),
            Self::Bicubic => cubic_interpolate(data, width, height, x, y, -0.5),
            Self::Bicubic2 => cubic_interpolate(data, width, height, x, y, -1.0),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Nearest neighbor interpolation.
pub fn nearest_interpolate(data: &[f64], width: usize, height: usize, x: f64, y: f64) -> f64 {
    let col = x.round().clamp(0.0, (width - 1) as f64) as usize;
    let row = y.round().clamp(0.0, (height - 1) as f64) as usize;
    data[row * width + col]
}

/// Bilinear interpolation.
///
/// Returns NaN when any of the four corners is NaN.
pub fn bilinear_interpolate(data: &[f64], width: usize, height: usize, x: f64, y: f64) -> f64 {
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f64::NAN;
    }

    // Exact hits stay exact
    if xf == 0.0 && yf == 0.0 {
        return v00;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Cubic convolution over the 4x4 neighbourhood with kernel parameter `a`.
///
/// Falls back to bilinear when any of the 16 samples is NaN.
pub fn cubic_interpolate(
    data: &[f64],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    a: f64,
) -> f64 {
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let xi = x.floor() as i64;
    let yi = y.floor() as i64;
    let xf = x - xi as f64;
    let yf = y - yi as f64;

    let mut values = [[0.0f64; 4]; 4];
    for j in 0..4 {
        for i in 0..4 {
            let px = (xi + i as i64 - 1).clamp(0, width as i64 - 1) as usize;
            let py = (yi + j as i64 - 1).clamp(0, height as i64 - 1) as usize;
            let v = data[py * width + px];
            if v.is_nan() {
                return bilinear_interpolate(data, width, height, x, y);
            }
            values[j][i] = v;
        }
    }

    let mut rows = [0.0f64; 4];
    for j in 0..4 {
        rows[j] = cubic_1d(&values[j], xf, a);
    }
    cubic_1d(&rows, yf, a)
}

fn cubic_1d(p: &[f64; 4], t: f64, a: f64) -> f64 {
    let w = [
        keys_weight(t + 1.0, a),
        keys_weight(t, a),
        keys_weight(1.0 - t, a),
        keys_weight(2.0 - t, a),
    ];
    p[0] * w[0] + p[1] * w[1] + p[2] * w[2] + p[3] * w[3]
}

/// Keys cubic convolution kernel.
fn keys_weight(s: f64, a: f64) -> f64 {
    let s = s.abs();
    if s <= 1.0 {
        (a + 2.0) * s * s * s - (a + 3.0) * s * s + 1.0
    } else if s < 2.0 {
        a * s * s * s - 5.0 * a * s * s + 8.0 * a * s - 4.0 * a
    } else {
        0.0
    }
}
