//! Core in-memory coverage types.

use geo_common::{BoundingBox, CrsCode, GridShape};

use crate::error::{ProcessorError, Result};

/// A named numeric channel of a coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    /// Row-major samples, row 0 at the north edge.
    pub data: Vec<f64>,
    /// Values that mean "no data" in this band.
    pub nodata: Vec<f64>,
    /// Declared range of valid values, if the source publishes one.
    pub valid_range: Option<(f64, f64)>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data,
            nodata: Vec::new(),
            valid_range: None,
        }
    }

    pub fn with_nodata(mut self, nodata: Vec<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// True when `value` is one of this band's nodata values.
    pub fn is_nodata(&self, value: f64, epsilon: f64) -> bool {
        nodata_matches(value, &self.nodata, epsilon)
    }

    /// Copy of the samples with nodata values replaced by NaN.
    pub fn masked(&self, epsilon: f64) -> Vec<f64> {
        if self.nodata.is_empty() {
            return self.data.clone();
        }
        self.data
            .iter()
            .map(|&v| if self.is_nodata(v, epsilon) { f64::NAN } else { v })
            .collect()
    }
}

/// Tolerance-aware membership of `value` in a nodata set.
///
/// Two values match when `|value - nd| <= epsilon * max(1, |nd|)`.
/// A NaN entry in the set matches NaN.
pub fn nodata_matches(value: f64, nodata: &[f64], epsilon: f64) -> bool {
    nodata.iter().any(|&nd| {
        if nd.is_nan() {
            value.is_nan()
        } else {
            (value - nd).abs() <= epsilon * nd.abs().max(1.0)
        }
    })
}

/// A georeferenced raster: one or more bands over a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub width: usize,
    pub height: usize,
    pub envelope: BoundingBox,
    pub crs: CrsCode,
    pub bands: Vec<Band>,
}

impl Coverage {
    /// Create a coverage, checking that every band has `width * height` samples.
    pub fn new(
        width: usize,
        height: usize,
        envelope: BoundingBox,
        crs: CrsCode,
        bands: Vec<Band>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ProcessorError::invalid_metadata(format!(
                "coverage has an empty grid {}x{}",
                width, height
            )));
        }
        if bands.is_empty() {
            return Err(ProcessorError::invalid_metadata("coverage has no bands"));
        }
        if let Some(band) = bands.iter().find(|b| b.data.len() != width * height) {
            return Err(ProcessorError::invalid_metadata(format!(
                "band '{}' has {} samples, expected {}x{}",
                band.name,
                band.data.len(),
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            envelope,
            crs,
            bands,
        })
    }

    /// Convenience constructor for a one-band coverage.
    pub fn single_band(
        width: usize,
        height: usize,
        envelope: BoundingBox,
        crs: CrsCode,
        data: Vec<f64>,
    ) -> Result<Self> {
        Self::new(width, height, envelope, crs, vec![Band::new("band_0", data)])
    }

    pub fn shape(&self) -> GridShape {
        GridShape::new(self.width, self.height)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, index: usize) -> Result<&Band> {
        self.bands.get(index).ok_or(ProcessorError::InvalidBand {
            band: index,
            available: self.bands.len(),
        })
    }

    /// Cell size along (x, y) in CRS units.
    pub fn cell_size(&self) -> (f64, f64) {
        (
            self.envelope.width() / self.width as f64,
            self.envelope.height() / self.height as f64,
        )
    }

    /// Sample at a cell.
    pub fn value(&self, band: usize, col: usize, row: usize) -> f64 {
        self.bands[band].data[row * self.width + col]
    }

    /// Center of a cell in CRS coordinates.
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let (dx, dy) = self.cell_size();
        (
            self.envelope.min_x + (col as f64 + 0.5) * dx,
            self.envelope.max_y - (row as f64 + 0.5) * dy,
        )
    }

    /// Fractional pixel position of a CRS coordinate, in a space where cell
    /// centers sit on integers. `None` when the point is off the raster.
    pub fn pixel_position(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (dx, dy) = self.cell_size();
        let col = snap((x - self.envelope.min_x) / dx - 0.5);
        let row = snap((self.envelope.max_y - y) / dy - 0.5);

        let inside = col >= -0.5
            && col <= self.width as f64 - 0.5
            && row >= -0.5
            && row <= self.height as f64 - 0.5;
        inside.then_some((col, row))
    }

    /// First nodata value of the first band, the one written to file headers.
    pub fn primary_nodata(&self) -> Option<f64> {
        self.bands.first().and_then(|b| b.nodata.first().copied())
    }

    /// Whether this coverage already sits on `shape` over `envelope`.
    pub fn matches_grid(&self, envelope: &BoundingBox, crs: CrsCode, shape: GridShape) -> bool {
        let same_crs = self.crs == crs || (self.crs.is_geographic() && crs.is_geographic());
        same_crs && self.shape() == shape && envelopes_equal(&self.envelope, envelope)
    }
}

/// Envelope equality up to a tolerance relative to the envelope size.
pub fn envelopes_equal(a: &BoundingBox, b: &BoundingBox) -> bool {
    let scale = a.width().abs().max(a.height().abs()).max(1e-12);
    let tol = scale * 1e-9;
    (a.min_x - b.min_x).abs() <= tol
        && (a.min_y - b.min_y).abs() <= tol
        && (a.max_x - b.max_x).abs() <= tol
        && (a.max_y - b.max_y).abs() <= tol
}

/// Remove floating noise so that exact cell centers land on integers.
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < 1e-9 {
        r
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Coverage {
        Coverage::single_band(
            4,
            2,
            BoundingBox::new(0.0, 0.0, 4.0, 2.0),
            CrsCode::Epsg4326,
            (0..8).map(|v| v as f64).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_wrong_band_length() {
        let err = Coverage::single_band(
            3,
            3,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            CrsCode::Epsg4326,
            vec![0.0; 8],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_cell_geometry() {
        let coverage = sample();
        assert_eq!(coverage.cell_size(), (1.0, 1.0));
        assert_eq!(coverage.cell_center(0, 0), (0.5, 1.5));
        assert_eq!(coverage.cell_center(3, 1), (3.5, 0.5));
        assert_eq!(coverage.value(0, 3, 1), 7.0);
    }

    #[test]
    fn test_pixel_position() {
        let coverage = sample();
        assert_eq!(coverage.pixel_position(0.5, 1.5), Some((0.0, 0.0)));
        assert_eq!(coverage.pixel_position(4.0, 0.0), Some((3.5, 1.5)));
        assert_eq!(coverage.pixel_position(4.1, 1.0), None);
        assert_eq!(coverage.pixel_position(1.0, -0.1), None);
    }

    #[test]
    fn test_band_lookup() {
        let coverage = sample();
        assert!(coverage.band(0).is_ok());
        match coverage.band(2) {
            Err(ProcessorError::InvalidBand { band, available }) => {
                assert_eq!(band, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nodata_matches_with_tolerance() {
        let nodata = [-9999.0];
        assert!(nodata_matches(-9999.0, &nodata, 1e-9));
        assert!(nodata_matches(-9999.000000001, &nodata, 1e-9));
        assert!(!nodata_matches(-9998.9999, &nodata, 1e-9));
        assert!(!nodata_matches(f64::NAN, &nodata, 1e-9));
        assert!(nodata_matches(f64::NAN, &[f64::NAN], 1e-9));
    }

    #[test]
    fn test_band_masking() {
        let band = Band::new("b", vec![1.0, -9999.0, 3.0]).with_nodata(vec![-9999.0]);
        let masked = band.masked(1e-9);
        assert_eq!(masked[0], 1.0);
        assert!(masked[1].is_nan());
        assert_eq!(masked[2], 3.0);
    }

    #[test]
    fn test_matches_grid() {
        let coverage = sample();
        let envelope = BoundingBox::new(0.0, 0.0, 4.0, 2.0);
        assert!(coverage.matches_grid(&envelope, CrsCode::Crs84, GridShape::new(4, 2)));
        assert!(!coverage.matches_grid(&envelope, CrsCode::Epsg3857, GridShape::new(4, 2)));
        assert!(!coverage.matches_grid(&envelope, CrsCode::Epsg4326, GridShape::new(2, 2)));
    }
}
