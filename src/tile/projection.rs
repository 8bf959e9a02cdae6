//! Spherical mercator helpers.
//!
//! Tile bounds are computed on the EPSG:3857 square and reprojected to WGS84
//! when a formatter needs geographic output.

use std::f64::consts::PI;

use serde::Serialize;

use super::coord::Coordinate;

/// Earth radius used by spherical mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the mercator square, in meters.
pub const MERCATOR_HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Latitude limit of the mercator square, in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// An axis-aligned bounding box `(min_x, min_y, max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow the box on every side by `amount`.
    pub fn expand(&self, amount: f64) -> Bounds {
        Bounds::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    /// Whether two boxes overlap, touching edges included.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Reproject both corners from mercator meters to WGS84 degrees.
    pub fn to_wgs84(&self) -> Bounds {
        let (min_lon, min_lat) = mercator_point_to_wgs84(self.min_x, self.min_y);
        let (max_lon, max_lat) = mercator_point_to_wgs84(self.max_x, self.max_y);
        Bounds::new(min_lon, min_lat, max_lon, max_lat)
    }
}

/// Tile bounds in mercator meters. Row 0 is the northern edge.
///
/// Zooms too deep for an `f64` divisor collapse to a zero-sized tile at the
/// column and row origin.
pub fn coord_to_mercator_bounds(coord: Coordinate) -> Bounds {
    let tile_size = 2.0 * MERCATOR_HALF_WORLD / 2f64.powf(coord.zoom as f64);
    let min_x = -MERCATOR_HALF_WORLD + coord.column as f64 * tile_size;
    let max_y = MERCATOR_HALF_WORLD - coord.row as f64 * tile_size;
    Bounds::new(min_x, max_y - tile_size, min_x + tile_size, max_y)
}

/// Convert a mercator point to `(longitude, latitude)` in degrees.
pub fn mercator_point_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Convert `(longitude, latitude)` in degrees to a mercator point.
///
/// Latitudes beyond the mercator limit are clamped.
pub fn wgs84_point_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}
