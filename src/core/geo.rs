use crate::core::constants::{MAX_LATITUDE, TILE_SIZE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from a GeoJSON `[lng, lat]` pair
    pub fn from_lng_lat(coordinates: [f64; 2]) -> Self {
        Self::new(coordinates[1], coordinates[0])
    }

    /// Returns the GeoJSON `[lng, lat]` ordering
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the projectable range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Projects a coordinate to world pixel space at `zoom` (EPSG:3857).
pub fn project(lat_lng: LatLng, zoom: f64) -> Point {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lat = LatLng::clamp_lat(lat_lng.lat).to_radians();

    let x = (lat_lng.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0 * scale;
    Point::new(x, y)
}

/// Inverse of [`project`].
pub fn unproject(point: Point, zoom: f64) -> LatLng {
    let scale = TILE_SIZE * 2_f64.powf(zoom);

    let lng = point.x / scale * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * point.y / scale);
    let lat = (2.0 * n.exp().atan() - PI / 2.0).to_degrees();
    LatLng::new(lat, lng)
}
