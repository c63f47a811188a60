//! Spherical (Web) Mercator projection.
//!
//! EPSG:3857 projects WGS84 coordinates onto a sphere of the WGS84
//! semi-major axis. Latitudes are clamped to the square domain
//! (about ±85.0511°).

use std::f64::consts::PI;

/// WGS84 semi-major axis, meters.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the Web Mercator square domain ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy)]
pub struct WebMercator {
    pub radius: f64,
}

impl Default for WebMercator {
    fn default() -> Self {
        Self {
            radius: EARTH_RADIUS,
        }
    }
}

impl WebMercator {
    /// Geographic degrees to meters.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = self.radius * lon.to_radians();
        let y = self.radius * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    /// Meters to geographic degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / self.radius).to_degrees();
        let lat = (2.0 * (y / self.radius).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}
