//! Tile addressing.
//!
//! - [`Coordinate`]: zoom/column/row values with pyramid validation
//! - [`parse_request_path`]: the `/<layer-spec>/<z>/<x>/<y>.<ext>` grammar
//! - [`Bounds`] and the mercator helpers used by formatters and fetchers

mod coord;
mod projection;
mod request;

pub use coord::Coordinate;
pub use projection::{
    coord_to_mercator_bounds, mercator_point_to_wgs84, wgs84_point_to_mercator, Bounds,
    EARTH_RADIUS, MAX_MERCATOR_LAT, MERCATOR_HALF_WORLD,
};
pub use request::{parse_request_path, RequestData};
