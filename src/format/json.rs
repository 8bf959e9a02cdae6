//! JSON tile format.
//!
//! A tile is a JSON object mapping each layer name to a GeoJSON
//! `FeatureCollection` in WGS84. This is also the layout of cached composite
//! tiles, so the same serde types are used to read them back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::EncodeError;
use crate::tile::{mercator_point_to_wgs84, Bounds, Coordinate};

use super::geometry::{from_wkb, Geometry};
use super::{FeatureLayer, Properties};

/// A GeoJSON feature as stored in JSON tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFeature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,

    pub geometry: Geometry,

    #[serde(default)]
    pub properties: Option<Properties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// A GeoJSON feature collection as stored in JSON tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,

    pub features: Vec<JsonFeature>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

/// Geometry is reprojected point by point, so the coordinate and bounds go
/// unused; they keep the signature shared with the other formatters.
pub(super) fn encode(
    feature_layers: &[FeatureLayer],
    _coord: Coordinate,
    _bounds_merc: Bounds,
    _bounds_wgs84: Bounds,
) -> Result<Bytes, EncodeError> {
    let mut tile = Map::new();
    for layer in feature_layers {
        let features = layer
            .features
            .iter()
            .map(|feature| -> Result<JsonFeature, EncodeError> {
                let geometry = from_wkb(&feature.wkb)?.map_points(&mut mercator_point_to_wgs84)?;
                Ok(JsonFeature {
                    kind: feature_type(),
                    geometry,
                    properties: Some(feature.properties.clone()),
                    id: feature.id,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let collection = JsonFeatureCollection {
            kind: feature_collection_type(),
            features,
        };
        let value = serde_json::to_value(collection)
            .map_err(|e| EncodeError::Serialize(e.to_string()))?;
        tile.insert(layer.name.clone(), value);
    }

    serde_json::to_vec(&tile)
        .map(Bytes::from)
        .map_err(|e| EncodeError::Serialize(e.to_string()))
}
