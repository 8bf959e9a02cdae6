//! Spatial data fetching.
//!
//! [`DataFetcher`] is the seam between the request pipeline and whatever
//! holds the map data. [`GeoJsonFetcher`] serves layers from GeoJSON files
//! loaded at startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::format::{to_wkb, Feature, FeatureLayer, Geometry, Properties};
use crate::layer::{LayerConfig, LayerDatum, LayerQuery};
use crate::tile::{coord_to_mercator_bounds, wgs84_point_to_mercator, Bounds, Coordinate};

use super::BackgroundPool;

/// Features for a coordinate plus the bounds they were selected with.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// One entry per requested layer, in request order
    pub feature_layers: Vec<FeatureLayer>,

    /// Exact tile bounds in mercator meters
    pub unpadded_bounds: Bounds,

    /// Tile bounds grown by the clipping margin
    pub padded_bounds: Bounds,
}

/// Source of feature data for a tile.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(
        &self,
        coord: Coordinate,
        layers: &[Arc<LayerDatum>],
    ) -> Result<FetchResult, FetchError>;
}

/// A feature with its precomputed mercator bbox.
#[derive(Debug, Clone)]
struct IndexedFeature {
    bbox: Bounds,
    feature: Feature,
}

#[derive(Debug, Clone)]
struct LoadedLayer {
    query: LayerQuery,
    features: Arc<Vec<IndexedFeature>>,
}

/// Serves layers from GeoJSON feature collections held in memory.
///
/// Sources are WGS84 GeoJSON; features are projected to mercator once at
/// load time. A fetch selects, per requested layer whose zoom range admits
/// the coordinate, the features whose bbox meets the padded tile bounds.
pub struct GeoJsonFetcher {
    layers: HashMap<String, LoadedLayer>,

    /// Margin around each tile as a fraction of the tile width
    padding: f64,

    /// Runs per-layer selection when set
    pool: Option<BackgroundPool>,
}

/// Lenient view of a source feature.
#[derive(Deserialize)]
struct SourceFeature {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Deserialize)]
struct SourceCollection {
    features: Vec<SourceFeature>,
}

impl GeoJsonFetcher {
    /// Create a fetcher with no layers loaded.
    pub fn new(padding: f64) -> Self {
        Self {
            layers: HashMap::new(),
            padding,
            pool: None,
        }
    }

    /// Load every registered layer that names a source file.
    pub fn from_config(config: &LayerConfig, padding: f64) -> Result<Self, FetchError> {
        let mut fetcher = Self::new(padding);
        for datum in config.layers() {
            let Some(source) = datum.query.source.as_deref() else {
                debug!(layer = %datum.name, "Layer has no source, serving empty");
                continue;
            };
            let features = load_source(&datum.name, source)?;
            info!(
                layer = %datum.name,
                features = features.len(),
                source = %source.display(),
                "Loaded layer"
            );
            fetcher.insert_features(&datum, features);
        }
        Ok(fetcher)
    }

    /// Use `pool` for the per-layer fan-out.
    pub fn with_pool(mut self, pool: BackgroundPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Add or replace a layer from GeoJSON text.
    pub fn add_layer_geojson(&mut self, datum: &LayerDatum, geojson: &str) -> Result<(), FetchError> {
        let features = parse_collection(&datum.name, geojson)?;
        self.insert_features(datum, features);
        Ok(())
    }

    fn insert_features(&mut self, datum: &LayerDatum, features: Vec<IndexedFeature>) {
        self.layers.insert(
            datum.name.clone(),
            LoadedLayer {
                query: datum.query.clone(),
                features: Arc::new(features),
            },
        );
    }

    /// Number of features loaded for `layer`.
    pub fn feature_count(&self, layer: &str) -> usize {
        self.layers.get(layer).map_or(0, |l| l.features.len())
    }
}

#[async_trait]
impl DataFetcher for GeoJsonFetcher {
    async fn fetch(
        &self,
        coord: Coordinate,
        layers: &[Arc<LayerDatum>],
    ) -> Result<FetchResult, FetchError> {
        let unpadded_bounds = coord_to_mercator_bounds(coord);
        let padded_bounds = unpadded_bounds.expand(unpadded_bounds.width() * self.padding);

        let mut feature_layers = Vec::with_capacity(layers.len());
        match &self.pool {
            None => {
                for datum in layers {
                    let features = self
                        .layers
                        .get(&datum.name)
                        .filter(|l| l.query.admits(coord.zoom))
                        .map(|l| select(&l.features, &padded_bounds))
                        .unwrap_or_default();
                    feature_layers.push(FeatureLayer {
                        name: datum.name.clone(),
                        features,
                    });
                }
            }
            Some(pool) => {
                let handles: Vec<_> = layers
                    .iter()
                    .map(|datum| {
                        let loaded = self
                            .layers
                            .get(&datum.name)
                            .filter(|l| l.query.admits(coord.zoom))
                            .map(|l| Arc::clone(&l.features));
                        let pool = pool.clone();
                        tokio::spawn(async move {
                            match loaded {
                                Some(features) => {
                                    pool.run(async { select(&features, &padded_bounds) }).await
                                }
                                None => Vec::new(),
                            }
                        })
                    })
                    .collect();

                for (datum, handle) in layers.iter().zip(handles) {
                    let features = handle
                        .await
                        .map_err(|e| FetchError::Query(format!("{}: {}", datum.name, e)))?;
                    feature_layers.push(FeatureLayer {
                        name: datum.name.clone(),
                        features,
                    });
                }
            }
        }

        Ok(FetchResult {
            feature_layers,
            unpadded_bounds,
            padded_bounds,
        })
    }
}

fn select(features: &[IndexedFeature], bounds: &Bounds) -> Vec<Feature> {
    features
        .iter()
        .filter(|f| f.bbox.intersects(bounds))
        .map(|f| f.feature.clone())
        .collect()
}

fn load_source(layer: &str, path: &Path) -> Result<Vec<IndexedFeature>, FetchError> {
    let text = std::fs::read_to_string(path).map_err(|e| FetchError::Source {
        source_path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_collection(layer, &text)
}

/// Parse a WGS84 feature collection into mercator features.
///
/// Features without geometry or with an empty geometry are skipped. Only
/// non-negative integer ids are kept.
fn parse_collection(layer: &str, text: &str) -> Result<Vec<IndexedFeature>, FetchError> {
    let invalid = |message: String| FetchError::InvalidSource {
        layer: layer.to_string(),
        message,
    };
    let collection: SourceCollection =
        serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;

    let mut features = Vec::with_capacity(collection.features.len());
    for source in collection.features {
        let Some(geometry) = source.geometry else {
            continue;
        };
        let projected = geometry
            .map_points(&mut wgs84_point_to_mercator)
            .map_err(|e| invalid(e.to_string()))?;
        let Some((min_x, min_y, max_x, max_y)) = projected.bbox() else {
            continue;
        };
        let wkb = to_wkb(&projected).map_err(|e| invalid(e.to_string()))?;
        features.push(IndexedFeature {
            bbox: Bounds::new(min_x, min_y, max_x, max_y),
            feature: Feature {
                wkb: Bytes::from(wkb),
                properties: source.properties.unwrap_or_default(),
                id: source.id.as_ref().and_then(Value::as_u64),
            },
        });
    }
    Ok(features)
}
