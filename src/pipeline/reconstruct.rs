//! Layer-subset tiles from cached composite tiles.
//!
//! Composite tiles are stored in the JSON format: an object mapping each
//! layer name to a GeoJSON feature collection in WGS84. A request for a
//! subset of layers can be answered by decoding that object, keeping the
//! requested layers and re-encoding them in the requested format.
//!
//! Feature ids do not survive this round trip.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::TileError;
use crate::format::{to_wkb, Feature, FeatureLayer, Format, Geometry, Properties};
use crate::layer::{LayerDatum, ALL_LAYERS};
use crate::store::TileStore;
use crate::tile::{coord_to_mercator_bounds, wgs84_point_to_mercator, Coordinate};

use super::MAX_CACHED_ZOOM;

/// Format composite tiles are stored and read in.
pub const CACHE_FORMAT: Format = Format::Json;

#[derive(Deserialize)]
struct CachedLayer {
    features: Vec<CachedFeature>,
}

#[derive(Deserialize)]
struct CachedFeature {
    geometry: Geometry,
    #[serde(default)]
    properties: Option<Properties>,
}

/// Re-slices cached composite tiles.
#[derive(Clone)]
pub struct CacheReconstructor {
    store: Arc<dyn TileStore>,
}

impl CacheReconstructor {
    pub fn new(store: Arc<dyn TileStore>) -> Self {
        Self { store }
    }

    /// Whether a request may be answered from the composite cache.
    ///
    /// `all` requests always go through the fetch pipeline so the composite
    /// gets rebuilt, and nothing above the cached zoom range is stored.
    pub fn applies_to(layer_spec: &str, coord: Coordinate) -> bool {
        layer_spec != ALL_LAYERS && coord.zoom <= MAX_CACHED_ZOOM
    }

    /// Build the tile for `layers` from the cached composite at `coord`.
    ///
    /// Returns `Ok(None)` when nothing usable is cached, including when the
    /// store read fails. A cached payload that does not decode is an error.
    pub async fn try_reconstruct(
        &self,
        coord: Coordinate,
        layers: &[Arc<LayerDatum>],
        format: Format,
    ) -> Result<Option<Bytes>, TileError> {
        let cached = match self.store.read_tile(coord, CACHE_FORMAT).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(coord = %coord, "No cached composite tile");
                return Ok(None);
            }
            Err(e) => {
                warn!(coord = %coord, error = %e, "Failed to read cached composite tile");
                return Ok(None);
            }
        };

        let feature_layers = decode_layers(&cached, layers)?;
        let bounds_merc = coord_to_mercator_bounds(coord);
        let bounds_wgs84 = bounds_merc.to_wgs84();
        let data = format.format_tile(&feature_layers, coord, bounds_merc, bounds_wgs84)?;

        debug!(
            coord = %coord,
            format = format.extension(),
            layers = feature_layers.len(),
            "Reconstructed tile from cache"
        );
        Ok(Some(data))
    }
}

/// Decode the composite tile, keeping only the requested layers.
///
/// Layers are returned in request order. Requested layers absent from the
/// cache are omitted; cached layers that were not requested are never
/// inspected.
fn decode_layers(data: &[u8], layers: &[Arc<LayerDatum>]) -> Result<Vec<FeatureLayer>, TileError> {
    let decode_err = |message: String| TileError::CacheDecode { message };

    let mut composite: Map<String, Value> =
        serde_json::from_slice(data).map_err(|e| decode_err(e.to_string()))?;

    let mut seen = HashSet::with_capacity(layers.len());
    let mut feature_layers = Vec::with_capacity(layers.len());
    for datum in layers {
        if !seen.insert(datum.name.as_str()) {
            continue;
        }
        let Some(value) = composite.remove(&datum.name) else {
            continue;
        };
        let cached: CachedLayer = serde_json::from_value(value)
            .map_err(|e| decode_err(format!("layer {}: {}", datum.name, e)))?;

        let features = cached
            .features
            .into_iter()
            .map(|f| -> Result<Feature, TileError> {
                let projected = f
                    .geometry
                    .map_points(&mut wgs84_point_to_mercator)
                    .map_err(|e| decode_err(format!("layer {}: {}", datum.name, e)))?;
                let wkb = to_wkb(&projected)
                    .map_err(|e| decode_err(format!("layer {}: {}", datum.name, e)))?;
                Ok(Feature {
                    wkb: Bytes::from(wkb),
                    properties: f.properties.unwrap_or_default(),
                    id: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        feature_layers.push(FeatureLayer {
            name: datum.name.clone(),
            features,
        });
    }
    Ok(feature_layers)
}
