//! Tile formats and the feature data they encode.
//!
//! The set of formats is closed and resolved by file extension through
//! [`Format::from_extension`]; there is no runtime registration.
//!
//! | Format | Extension | Mimetype                 |
//! |--------|-----------|--------------------------|
//! | Json   | `json`    | `application/json`       |
//! | Mvt    | `mvt`     | `application/x-protobuf` |
//!
//! Every formatter receives the same inputs: feature layers whose geometry
//! is mercator WKB, the tile coordinate, and the tile bounds in both
//! mercator meters and WGS84 degrees.

pub mod geometry;
mod json;
mod mvt;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::tile::{Bounds, Coordinate};

pub use geometry::{from_wkb, to_wkb, Geometry, Position};
pub use mvt::MVT_EXTENT;

/// A feature property mapping.
pub type Properties = Map<String, Value>;

/// One feature: mercator WKB geometry, properties and an optional id.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub wkb: Bytes,
    pub properties: Properties,
    pub id: Option<u64>,
}

/// A named, ordered list of features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayer {
    pub name: String,
    pub features: Vec<Feature>,
}

/// Output format of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// A JSON object of GeoJSON feature collections keyed by layer name
    Json,
    /// Mapbox Vector Tile protobuf
    Mvt,
}

impl Format {
    /// Every supported format.
    pub const ALL: [Format; 2] = [Format::Json, Format::Mvt];

    /// Look up a format by file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Mvt => "mvt",
        }
    }

    pub fn mimetype(self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Mvt => "application/x-protobuf",
        }
    }

    /// Encode feature layers into this format.
    pub fn format_tile(
        self,
        feature_layers: &[FeatureLayer],
        coord: Coordinate,
        bounds_merc: Bounds,
        bounds_wgs84: Bounds,
    ) -> Result<Bytes, EncodeError> {
        match self {
            Format::Json => json::encode(feature_layers, coord, bounds_merc, bounds_wgs84),
            Format::Mvt => mvt::encode(feature_layers, coord, bounds_merc, bounds_wgs84),
        }
    }
}
