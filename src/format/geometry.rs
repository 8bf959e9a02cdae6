//! Structural geometry and its well-known-binary encoding.
//!
//! [`Geometry`] mirrors GeoJSON geometry objects and is what cached JSON
//! tiles carry. Feature layers passed to formatters carry geometry as 2D
//! little-endian WKB instead, produced by [`to_wkb`] and read back with
//! [`from_wkb`]. Only the first two ordinates of a position are kept.

use geozero::geojson::GeoJson;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToJson, ToWkb};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// A position as written in GeoJSON; at least two ordinates.
pub type Position = Vec<f64>;

/// A GeoJSON geometry object, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Apply `f` to every `(x, y)` pair, dropping extra ordinates.
    pub fn map_points<F>(&self, f: &mut F) -> Result<Geometry, GeometryError>
    where
        F: FnMut(f64, f64) -> (f64, f64),
    {
        fn point<F: FnMut(f64, f64) -> (f64, f64)>(
            p: &Position,
            f: &mut F,
        ) -> Result<Position, GeometryError> {
            let (x, y) = xy(p)?;
            let (x, y) = f(x, y);
            Ok(vec![x, y])
        }
        fn line<F: FnMut(f64, f64) -> (f64, f64)>(
            ps: &[Position],
            f: &mut F,
        ) -> Result<Vec<Position>, GeometryError> {
            ps.iter().map(|p| point(p, f)).collect()
        }
        fn poly<F: FnMut(f64, f64) -> (f64, f64)>(
            rings: &[Vec<Position>],
            f: &mut F,
        ) -> Result<Vec<Vec<Position>>, GeometryError> {
            rings.iter().map(|r| line(r, f)).collect()
        }

        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: point(coordinates, f)?,
            },
            Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
                coordinates: line(coordinates, f)?,
            },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: line(coordinates, f)?,
            },
            Geometry::MultiLineString { coordinates } => Geometry::MultiLineString {
                coordinates: poly(coordinates, f)?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: poly(coordinates, f)?,
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|p| poly(p, f))
                    .collect::<Result<_, _>>()?,
            },
            Geometry::GeometryCollection { geometries } => Geometry::GeometryCollection {
                geometries: geometries
                    .iter()
                    .map(|g| g.map_points(f))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`, or `None` when empty.
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        let mut acc: Option<(f64, f64, f64, f64)> = None;
        self.visit_points(&mut |x, y| {
            acc = Some(match acc {
                None => (x, y, x, y),
                Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
            });
        });
        acc
    }

    fn visit_points<F: FnMut(f64, f64)>(&self, f: &mut F) {
        let visit = |ps: &[Position], f: &mut F| {
            for p in ps {
                if p.len() >= 2 {
                    f(p[0], p[1]);
                }
            }
        };
        match self {
            Geometry::Point { coordinates } => visit(std::slice::from_ref(coordinates), f),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                visit(coordinates, f)
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().for_each(|r| visit(r, f))
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .for_each(|r| visit(r, f)),
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().for_each(|g| g.visit_points(f))
            }
        }
    }
}

pub(crate) fn xy(p: &Position) -> Result<(f64, f64), GeometryError> {
    match p.as_slice() {
        [x, y, ..] => Ok((*x, *y)),
        _ => Err(GeometryError::ShortPosition(p.len())),
    }
}

// =============================================================================
// WKB
// =============================================================================

/// Serialize a geometry as 2D GeoJSON text for the geozero readers.
pub(crate) fn geojson_text(geometry: &Geometry) -> Result<String, GeometryError> {
    let flat = geometry.map_points(&mut |x, y| (x, y))?;
    Ok(serde_json::to_string(&flat)?)
}

/// Encode a geometry as 2D little-endian WKB.
pub fn to_wkb(geometry: &Geometry) -> Result<Vec<u8>, GeometryError> {
    let text = geojson_text(geometry)?;
    Ok(GeoJson(&text).to_wkb(CoordDimensions::xy())?)
}

/// Decode 2D WKB in either byte order.
pub fn from_wkb(data: &[u8]) -> Result<Geometry, GeometryError> {
    let text = Wkb(data.to_vec()).to_json()?;
    Ok(serde_json::from_str(&text)?)
}
