//! Geographic primitives and the Web-Mercator pixel projection used by
//! screen-space clustering.

use serde::{Deserialize, Serialize};

/// Base world tile size in pixels at zoom 0.
const TILE_SIZE: f64 = 256.0;

/// A latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Axis-aligned viewport bounds in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Whether the point lies inside (edges inclusive).
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }
}

/// Project a coordinate to world pixel space at the given zoom level.
///
/// World size is `256 * 2^zoom` pixels; x grows east, y grows south.
/// Latitudes are clamped to the Mercator limit.
pub fn project(lat: f64, lng: f64, zoom: f64) -> (f64, f64) {
    let world = TILE_SIZE * 2f64.powf(zoom);
    let lat = lat.clamp(-85.05112878, 85.05112878);
    let x = (lng + 180.0) / 360.0 * world;
    let sin_lat = lat.to_radians().sin();
    let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * std::f64::consts::PI)) * world;
    (x, y)
}

/// Pixel distance between two projected coordinates at a zoom level.
pub fn pixel_distance(a: LatLng, b: LatLng, zoom: f64) -> f64 {
    let (ax, ay) = project(a.lat, a.lng, zoom);
    let (bx, by) = project(b.lat, b.lng, zoom);
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_origin() {
        // (0,0) sits at the center of the world square.
        let (x, y) = project(0.0, 0.0, 0.0);
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_zoom_doubles() {
        let (x0, y0) = project(41.15, 20.17, 4.0);
        let (x1, y1) = project(41.15, 20.17, 5.0);
        assert!((x1 - x0 * 2.0).abs() < 1e-6);
        assert!((y1 - y0 * 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_distance_grows_with_zoom() {
        let a = LatLng { lat: 41.15, lng: 20.16 };
        let b = LatLng { lat: 41.16, lng: 20.17 };
        let near = pixel_distance(a, b, 7.0);
        let far = pixel_distance(a, b, 12.0);
        assert!(far > near * 30.0);
    }

    #[test]
    fn test_bounding_box_contains() {
        // Albania viewport from the map defaults.
        let bounds = BoundingBox {
            west: 18.5,
            south: 39.5,
            east: 21.5,
            north: 43.0,
        };
        assert!(bounds.contains(41.1533, 20.1683));
        assert!(!bounds.contains(48.85, 2.35));
    }
}
