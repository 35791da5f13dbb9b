use crate::core::geo::{project, unproject, LatLng, Point};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// The rectangle and integer zoom level a fetch is built from.
///
/// Invariant: `west < east`, `south < north`. Values may lie outside
/// [-180, 180] when the camera has wrapped around the antimeridian; the
/// clustering service is responsible for normalizing them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub zoom: u8,
}

impl Viewport {
    /// Creates a viewport, rejecting degenerate or non-finite rectangles
    pub fn new(west: f64, south: f64, east: f64, north: f64, zoom: u8) -> Result<Self> {
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite {
            return Err(MapError::InvalidViewport(format!(
                "non-finite bounds [{west}, {south}, {east}, {north}]"
            )));
        }
        if west >= east || south >= north {
            return Err(MapError::InvalidViewport(format!(
                "empty bounds [{west}, {south}, {east}, {north}]"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
            zoom,
        })
    }

    /// `[west, south, east, north]`, the order the clustering service expects
    pub fn bbox(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// Raw camera state as reported by the rendering surface.
///
/// The zoom is fractional here; it is only rounded when a [`Viewport`] is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub zoom: f64,
}

impl Camera {
    pub fn new(west: f64, south: f64, east: f64, north: f64, zoom: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
            zoom,
        }
    }

    /// Camera covering a screen of `size` pixels centred on `center` at `zoom`
    pub fn around(center: LatLng, zoom: f64, size: Point) -> Self {
        let origin = project(center, zoom);
        let north_west = unproject(
            Point::new(origin.x - size.x / 2.0, origin.y - size.y / 2.0),
            zoom,
        );
        let south_east = unproject(
            Point::new(origin.x + size.x / 2.0, origin.y + size.y / 2.0),
            zoom,
        );

        Self::new(
            north_west.lng,
            south_east.lat,
            south_east.lng,
            north_west.lat,
            zoom,
        )
    }

    /// Zoom as sent to the service: rounded to the nearest integer, never negative
    pub fn rounded_zoom(&self) -> u8 {
        if !self.zoom.is_finite() {
            return 0;
        }
        self.zoom.round().clamp(0.0, u8::MAX as f64) as u8
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Derives the fetchable viewport for this camera
    pub fn to_viewport(&self) -> Result<Viewport> {
        Viewport::new(
            self.west,
            self.south,
            self.east,
            self.north,
            self.rounded_zoom(),
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(-180.0, -85.0, 180.0, 85.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_creation() {
        let viewport = Viewport::new(-10.0, -10.0, 10.0, 10.0, 5).unwrap();

        assert_eq!(viewport.bbox(), [-10.0, -10.0, 10.0, 10.0]);
        assert_eq!(viewport.zoom, 5);
        assert_eq!(viewport.center(), LatLng::new(0.0, 0.0));
    }

    #[test]
    fn test_viewport_rejects_empty_bounds() {
        assert!(Viewport::new(10.0, -10.0, -10.0, 10.0, 5).is_err());
        assert!(Viewport::new(-10.0, 10.0, 10.0, 10.0, 5).is_err());
        assert!(Viewport::new(f64::NAN, -10.0, 10.0, 10.0, 5).is_err());
    }

    #[test]
    fn test_zoom_rounding() {
        let mut camera = Camera::new(-10.0, -10.0, 10.0, 10.0, 4.49);
        assert_eq!(camera.rounded_zoom(), 4);

        camera.zoom = 4.5;
        assert_eq!(camera.rounded_zoom(), 5);

        camera.zoom = -0.7;
        assert_eq!(camera.rounded_zoom(), 0);
    }

    #[test]
    fn test_camera_around_is_centred() {
        let center = LatLng::new(10.0, 20.0);
        let camera = Camera::around(center, 9.0, Point::new(800.0, 600.0));

        assert!(camera.west < 20.0 && camera.east > 20.0);
        assert!(camera.south < 10.0 && camera.north > 10.0);
        assert!(((camera.west + camera.east) / 2.0 - 20.0).abs() < 1e-9);
        assert_eq!(camera.rounded_zoom(), 9);
    }

    #[test]
    fn test_higher_zoom_covers_less() {
        let center = LatLng::new(0.0, 0.0);
        let size = Point::new(800.0, 600.0);
        let wide = Camera::around(center, 6.0, size);
        let narrow = Camera::around(center, 9.0, size);

        assert!(narrow.east - narrow.west < wide.east - wide.west);
    }
}
