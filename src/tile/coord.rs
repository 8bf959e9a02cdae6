//! Tile coordinates in the zoom/column/row pyramid.
//!
//! A [`Coordinate`] is a plain value: it is parsed from three path segments
//! and only later checked against the pyramid bounds with
//! [`Coordinate::is_valid`]. Keeping the two steps apart lets a negative or
//! out-of-range component parse successfully and then be rejected as
//! invalid, which is what the request grammar expects.

use std::fmt;

use crate::error::CoordError;

/// A tile address: zoom level plus column and row within that level.
///
/// Components are signed so that out-of-range input can be represented and
/// rejected by [`Coordinate::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub zoom: i64,
    pub column: i64,
    pub row: i64,
}

impl Coordinate {
    pub const fn new(zoom: i64, column: i64, row: i64) -> Self {
        Self { zoom, column, row }
    }

    /// Parse a coordinate from its zoom, column and row strings.
    ///
    /// Only checks that each component is an integer; range checks are the
    /// job of [`Coordinate::is_valid`].
    pub fn parse(zoom: &str, column: &str, row: &str) -> Result<Self, CoordError> {
        Ok(Self {
            zoom: parse_component("zoom", zoom)?,
            column: parse_component("column", column)?,
            row: parse_component("row", row)?,
        })
    }

    /// Whether the coordinate addresses a tile inside the pyramid.
    ///
    /// True iff zoom is non-negative and both column and row lie in
    /// `[0, 2^zoom)`.
    pub fn is_valid(&self) -> bool {
        if self.zoom < 0 || self.column < 0 || self.row < 0 {
            return false;
        }
        let max = tiles_per_side(self.zoom);
        (self.column as i128) < max && (self.row as i128) < max
    }

    /// Map this coordinate to the tile containing it at `zoom`.
    ///
    /// For a coarser zoom the column and row are divided by
    /// `2^(self.zoom - zoom)`; for a finer zoom they are scaled up to the
    /// top-left child.
    pub fn container_at(&self, zoom: i64) -> Coordinate {
        if zoom <= self.zoom {
            let shift = self.zoom - zoom;
            Coordinate {
                zoom,
                column: shift_down(self.column, shift),
                row: shift_down(self.row, shift),
            }
        } else {
            let shift = zoom - self.zoom;
            Coordinate {
                zoom,
                column: shift_up(self.column, shift),
                row: shift_up(self.row, shift),
            }
        }
    }
}

/// Serialized as `zoom/column/row`.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
    }
}

fn parse_component(component: &'static str, value: &str) -> Result<i64, CoordError> {
    value.parse().map_err(|_| CoordError::NotNumeric {
        component,
        value: value.to_string(),
    })
}

/// `2^zoom` for a non-negative zoom, saturating beyond the i64 range.
fn tiles_per_side(zoom: i64) -> i128 {
    if zoom >= 100 {
        i128::MAX
    } else {
        1i128 << zoom
    }
}

fn shift_down(value: i64, shift: i64) -> i64 {
    value >> shift.min(63)
}

fn shift_up(value: i64, shift: i64) -> i64 {
    let scaled = (value as i128) << shift.min(64);
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

// =============================================================================
// Tests
// =============================================================================
