//! Mapbox Vector Tile encoder.
//!
//! Writes version 2 tiles with a fixed extent through geozero's MVT writer,
//! which quantizes mercator coordinates into tile space (origin top-left,
//! y down). Before encoding, each geometry is clamped to a window around the
//! tile, split out of collections, and its polygon rings are oriented so the
//! exterior ends up clockwise on screen and holes counter-clockwise.

use std::collections::HashMap;

use bytes::Bytes;
use geozero::geojson::GeoJson;
use geozero::mvt::{tile, Message, Tile};
use geozero::ToMvt;
use serde_json::Value;

use crate::error::{EncodeError, GeometryError};
use crate::tile::{Bounds, Coordinate};

use super::geometry::{from_wkb, geojson_text, Geometry, Position};
use super::{Feature, FeatureLayer, Properties};

/// Tile-space extent of encoded layers.
pub const MVT_EXTENT: u32 = 4096;

const MVT_VERSION: u32 = 2;

/// Geometry is clamped to this many tile widths beyond each edge so
/// quantized command deltas stay within `i32`.
const CLAMP_TILES: f64 = 64.0;

/// Coordinate and WGS84 bounds are unused; they keep the signature shared
/// with the other formatters.
pub(super) fn encode(
    feature_layers: &[FeatureLayer],
    _coord: Coordinate,
    bounds_merc: Bounds,
    _bounds_wgs84: Bounds,
) -> Result<Bytes, EncodeError> {
    let mut tile = Tile::default();
    for layer in feature_layers {
        let mut builder = LayerBuilder::default();
        for feature in &layer.features {
            builder.add_feature(feature, bounds_merc)?;
        }
        tile.layers.push(builder.finish(&layer.name));
    }
    Ok(Bytes::from(tile.encode_to_vec()))
}

// =============================================================================
// Values
// =============================================================================

/// Hashable stand-in for `tile::Value`, used to deduplicate layer values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MvtValue {
    String(String),
    /// Stored as bits so the value can be hashed
    Double(u64),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl MvtValue {
    /// Nulls have no tile representation; nested values become JSON text.
    fn from_json(value: &Value) -> Option<MvtValue> {
        Some(match value {
            Value::Null => return None,
            Value::Bool(b) => MvtValue::Bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    MvtValue::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    MvtValue::Int(i)
                } else {
                    MvtValue::Double(n.as_f64()?.to_bits())
                }
            }
            Value::String(s) => MvtValue::String(s.clone()),
            other => MvtValue::String(other.to_string()),
        })
    }

    fn into_tile_value(self) -> tile::Value {
        match self {
            MvtValue::String(s) => tile::Value {
                string_value: Some(s),
                ..Default::default()
            },
            MvtValue::Double(bits) => tile::Value {
                double_value: Some(f64::from_bits(bits)),
                ..Default::default()
            },
            MvtValue::Int(i) => tile::Value {
                sint_value: Some(i),
                ..Default::default()
            },
            MvtValue::Uint(u) => tile::Value {
                uint_value: Some(u),
                ..Default::default()
            },
            MvtValue::Bool(b) => tile::Value {
                bool_value: Some(b),
                ..Default::default()
            },
        }
    }
}

// =============================================================================
// Layer
// =============================================================================

#[derive(Default)]
struct LayerBuilder {
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
    values: Vec<MvtValue>,
    value_index: HashMap<MvtValue, u32>,
    features: Vec<tile::Feature>,
}

impl LayerBuilder {
    /// Encode one feature. Collection members become separate tile features
    /// sharing the id and tags; a feature with nothing drawable is skipped.
    fn add_feature(&mut self, feature: &Feature, bounds: Bounds) -> Result<(), EncodeError> {
        let geometry = from_wkb(&feature.wkb)?;
        let mut parts = Vec::new();
        split_parts(geometry, &mut parts);

        let mut encoded = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(part) = prepare(&part, bounds)? {
                encoded.push(encode_part(&part, bounds)?);
            }
        }
        if encoded.is_empty() {
            return Ok(());
        }

        let tags = self.tags(&feature.properties);
        for mut tile_feature in encoded {
            tile_feature.id = feature.id;
            tile_feature.tags = tags.clone();
            self.features.push(tile_feature);
        }
        Ok(())
    }

    fn tags(&mut self, properties: &Properties) -> Vec<u32> {
        let mut tags = Vec::with_capacity(properties.len() * 2);
        for (key, value) in properties {
            let Some(value) = MvtValue::from_json(value) else {
                continue;
            };
            let key_id = match self.key_index.get(key) {
                Some(&id) => id,
                None => {
                    let id = self.keys.len() as u32;
                    self.keys.push(key.clone());
                    self.key_index.insert(key.clone(), id);
                    id
                }
            };
            let value_id = match self.value_index.get(&value) {
                Some(&id) => id,
                None => {
                    let id = self.values.len() as u32;
                    self.values.push(value.clone());
                    self.value_index.insert(value, id);
                    id
                }
            };
            tags.push(key_id);
            tags.push(value_id);
        }
        tags
    }

    fn finish(self, name: &str) -> tile::Layer {
        tile::Layer {
            version: MVT_VERSION,
            name: name.to_string(),
            features: self.features,
            keys: self.keys,
            values: self
                .values
                .into_iter()
                .map(MvtValue::into_tile_value)
                .collect(),
            extent: Some(MVT_EXTENT),
        }
    }
}

// =============================================================================
// Geometry
// =============================================================================

fn encode_part(part: &Geometry, bounds: Bounds) -> Result<tile::Feature, GeometryError> {
    let text = geojson_text(part)?;
    Ok(GeoJson(&text).to_mvt(
        MVT_EXTENT,
        bounds.min_x,
        bounds.min_y,
        bounds.max_x,
        bounds.max_y,
    )?)
}

/// Flatten collections, depth first.
fn split_parts(geometry: Geometry, out: &mut Vec<Geometry>) {
    match geometry {
        Geometry::GeometryCollection { geometries } => {
            for member in geometries {
                split_parts(member, out);
            }
        }
        other => out.push(other),
    }
}

/// Clamp a part to the window around the tile and orient its rings.
///
/// Returns `None` when nothing drawable is left: empty multi-geometries,
/// lines with fewer than two points, polygons whose exterior has no area.
fn prepare(part: &Geometry, bounds: Bounds) -> Result<Option<Geometry>, GeometryError> {
    let window = bounds.expand(bounds.width().max(bounds.height()) * CLAMP_TILES);
    let clamped = part.map_points(&mut |x, y| {
        (
            x.clamp(window.min_x, window.max_x),
            y.clamp(window.min_y, window.max_y),
        )
    })?;

    Ok(match clamped {
        Geometry::Point { .. } => Some(clamped),
        Geometry::MultiPoint { coordinates } => {
            (!coordinates.is_empty()).then_some(Geometry::MultiPoint { coordinates })
        }
        Geometry::LineString { coordinates } => {
            drawable_line(coordinates).map(|coordinates| Geometry::LineString { coordinates })
        }
        Geometry::MultiLineString { coordinates } => {
            let lines: Vec<_> = coordinates.into_iter().filter_map(drawable_line).collect();
            (!lines.is_empty()).then_some(Geometry::MultiLineString { coordinates: lines })
        }
        Geometry::Polygon { coordinates } => {
            orient_polygon(coordinates).map(|coordinates| Geometry::Polygon { coordinates })
        }
        Geometry::MultiPolygon { coordinates } => {
            let polygons: Vec<_> = coordinates.into_iter().filter_map(orient_polygon).collect();
            (!polygons.is_empty()).then_some(Geometry::MultiPolygon {
                coordinates: polygons,
            })
        }
        _ => None,
    })
}

fn drawable_line(mut line: Vec<Position>) -> Option<Vec<Position>> {
    line.dedup();
    (line.len() >= 2).then_some(line)
}

/// Twice the signed area by the surveyor's formula, y up.
fn signed_area(ring: &[Position]) -> f64 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum()
}

/// Orient rings for a y-down tile: the exterior clockwise (negative area)
/// and holes counter-clockwise in mercator. Rings without area are dropped,
/// and so is the polygon when its exterior has none.
fn orient_polygon(rings: Vec<Vec<Position>>) -> Option<Vec<Vec<Position>>> {
    let mut oriented = Vec::with_capacity(rings.len());
    for (index, mut ring) in rings.into_iter().enumerate() {
        let exterior = index == 0;
        let area = signed_area(&ring);
        if ring.len() < 3 || area == 0.0 {
            if exterior {
                return None;
            }
            continue;
        }
        if (area < 0.0) != exterior {
            ring.reverse();
        }
        oriented.push(ring);
    }
    (!oriented.is_empty()).then_some(oriented)
}
