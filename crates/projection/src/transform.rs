//! Point and envelope transforms between two CRS codes.

use geo_common::{BoundingBox, CrsCode};

use crate::mercator::WebMercator;
use crate::ProjectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Identity,
    GeographicToMercator,
    MercatorToGeographic,
}

/// A resolved transform from one CRS to another.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    from: CrsCode,
    to: CrsCode,
    kind: Kind,
    mercator: WebMercator,
}

impl Transformer {
    /// Resolve a transform.
    ///
    /// Identical codes always resolve to the identity, even unresolved ones.
    /// All geographic codes are considered equivalent.
    pub fn new(from: CrsCode, to: CrsCode) -> Result<Self, ProjectionError> {
        let kind = if from == to || (from.is_geographic() && to.is_geographic()) {
            Kind::Identity
        } else if from.is_geographic() && to == CrsCode::Epsg3857 {
            Kind::GeographicToMercator
        } else if from == CrsCode::Epsg3857 && to.is_geographic() {
            Kind::MercatorToGeographic
        } else {
            return Err(ProjectionError::Unsupported {
                from: from.to_string(),
                to: to.to_string(),
            });
        };

        Ok(Self {
            from,
            to,
            kind,
            mercator: WebMercator::default(),
        })
    }

    pub fn source(&self) -> CrsCode {
        self.from
    }

    pub fn target(&self) -> CrsCode {
        self.to
    }

    pub fn is_identity(&self) -> bool {
        self.kind == Kind::Identity
    }

    /// Transform a single coordinate.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match self.kind {
            Kind::Identity => (x, y),
            Kind::GeographicToMercator => self.mercator.forward(x, y),
            Kind::MercatorToGeographic => self.mercator.inverse(x, y),
        }
    }

    /// Transform an envelope by densifying its edges with `segments` points
    /// per side and taking the bounds of the result.
    pub fn transform_envelope(&self, bbox: &BoundingBox, segments: usize) -> BoundingBox {
        if self.is_identity() {
            return *bbox;
        }

        let segments = segments.max(1);
        let mut out = BoundingBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for i in 0..=segments {
            let t = i as f64 / segments as f64;
            let x = bbox.min_x + t * bbox.width();
            let y = bbox.min_y + t * bbox.height();
            for (px, py) in [
                (x, bbox.min_y),
                (x, bbox.max_y),
                (bbox.min_x, y),
                (bbox.max_x, y),
            ] {
                let (tx, ty) = self.transform(px, py);
                out.min_x = out.min_x.min(tx);
                out.min_y = out.min_y.min(ty);
                out.max_x = out.max_x.max(tx);
                out.max_y = out.max_y.max(ty);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_identity_cases() {
        assert!(Transformer::new(CrsCode::Epsg4326, CrsCode::Crs84)
            .unwrap()
            .is_identity());
        assert!(Transformer::new(CrsCode::Other(32618), CrsCode::Other(32618))
            .unwrap()
            .is_identity());
    }

    #[test]
    fn test_unresolved_pairs_are_refused() {
        assert!(Transformer::new(CrsCode::Epsg4326, CrsCode::Other(32618)).is_err());
        assert!(Transformer::new(CrsCode::Other(2154), CrsCode::Epsg3857).is_err());
    }

    #[test]
    fn test_envelope_round_trip() {
        let bbox = BoundingBox::new(-75.0, 3.0, -73.0, 5.0);
        let forward = Transformer::new(CrsCode::Epsg4326, CrsCode::Epsg3857).unwrap();
        let inverse = Transformer::new(CrsCode::Epsg3857, CrsCode::Epsg4326).unwrap();

        let projected = forward.transform_envelope(&bbox, 8);
        assert!(projected.min_x < -8_000_000.0);
        let back = inverse.transform_envelope(&projected, 8);
        assert_approx_eq!(back.min_x, bbox.min_x, 1e-9);
        assert_approx_eq!(back.max_y, bbox.max_y, 1e-9);
    }
}
