//! Test utilities for integration tests.
//!
//! Mock collaborators that record how they were called, plus a harness that
//! builds a router around them.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use tile_server::error::{EncodeError, FetchError, HealthError, StoreError};
use tile_server::format::to_wkb;
use tile_server::pipeline::{
    BackgroundPool, DataFetcher, FetchPipeline, FetchResult, FormattedTile, TileProcessor,
};
use tile_server::server::{create_router, AppState, HealthCheck, RouterConfig};
use tile_server::store::{MemoryTilesOfInterest, TileStore};
use tile_server::tile::{coord_to_mercator_bounds, Bounds};
use tile_server::{
    Coordinate, Feature, FeatureLayer, Format, FormatProcessor, Geometry, LayerConfig, LayerDatum,
    LayerQuery,
};

// =============================================================================
// Layer Registry
// =============================================================================

/// Three sourceless layers, all part of the composite.
pub fn test_layers() -> Arc<LayerConfig> {
    let layers = ["water", "roads", "buildings"]
        .into_iter()
        .map(|name| LayerDatum::new(name, LayerQuery::default()))
        .collect();
    Arc::new(LayerConfig::with_all(layers).unwrap())
}

// =============================================================================
// Mock Fetcher
// =============================================================================

/// A fetcher that returns one point per layer at the tile center.
///
/// The point carries the layer name as its `layer` property and the zoom
/// as its id.
#[derive(Clone, Default)]
pub struct CountingFetcher {
    calls: Arc<AtomicUsize>,
    requested: Arc<Mutex<Vec<Vec<String>>>>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Layer names passed to each fetch, in call order.
    pub fn requested_layers(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataFetcher for CountingFetcher {
    async fn fetch(
        &self,
        coord: Coordinate,
        layers: &[Arc<LayerDatum>],
    ) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push(layers.iter().map(|l| l.name.clone()).collect());

        let bounds = coord_to_mercator_bounds(coord);
        let center = vec![
            (bounds.min_x + bounds.max_x) / 2.0,
            (bounds.min_y + bounds.max_y) / 2.0,
        ];
        let wkb = to_wkb(&Geometry::Point { coordinates: center }).unwrap();

        let feature_layers = layers
            .iter()
            .map(|datum| {
                let mut properties = serde_json::Map::new();
                properties.insert("layer".to_string(), datum.name.clone().into());
                FeatureLayer {
                    name: datum.name.clone(),
                    features: vec![Feature {
                        wkb: Bytes::from(wkb.clone()),
                        properties,
                        id: Some(coord.zoom as u64),
                    }],
                }
            })
            .collect();

        Ok(FetchResult {
            feature_layers,
            unpadded_bounds: bounds,
            padded_bounds: bounds,
        })
    }
}

/// A fetcher whose data source is down.
pub struct FailingFetcher;

#[async_trait]
impl DataFetcher for FailingFetcher {
    async fn fetch(
        &self,
        _coord: Coordinate,
        _layers: &[Arc<LayerDatum>],
    ) -> Result<FetchResult, FetchError> {
        Err(FetchError::Query("connection refused".to_string()))
    }
}

// =============================================================================
// Mock Processor
// =============================================================================

/// A processor that returns `count` copies of the same tile.
pub struct FixedCountProcessor {
    pub count: usize,
}

#[async_trait]
impl TileProcessor for FixedCountProcessor {
    async fn process(
        &self,
        _coord: Coordinate,
        _feature_layers: &[FeatureLayer],
        formats: &[Format],
        _unpadded_bounds: Bounds,
        _padded_bounds: Bounds,
    ) -> Result<Vec<FormattedTile>, EncodeError> {
        Ok((0..self.count)
            .map(|_| FormattedTile {
                format: formats[0],
                data: Bytes::from_static(b"{}"),
            })
            .collect())
    }
}

// =============================================================================
// Mock Store
// =============================================================================

/// An in-memory tile store that counts reads and writes.
#[derive(Default)]
pub struct MemoryStore {
    tiles: Mutex<HashMap<(Coordinate, Format), Bytes>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile(self, coord: Coordinate, format: Format, data: impl Into<Bytes>) -> Self {
        self.tiles
            .lock()
            .unwrap()
            .insert((coord, format), data.into());
        self
    }

    pub fn get(&self, coord: Coordinate, format: Format) -> Option<Bytes> {
        self.tiles.lock().unwrap().get(&(coord, format)).cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileStore for MemoryStore {
    async fn read_tile(
        &self,
        coord: Coordinate,
        format: Format,
    ) -> Result<Option<Bytes>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(coord, format))
    }

    async fn write_tile(
        &self,
        data: Bytes,
        coord: Coordinate,
        format: Format,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.tiles.lock().unwrap().insert((coord, format), data);
        Ok(())
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl TileStore for BrokenStore {
    async fn read_tile(
        &self,
        _coord: Coordinate,
        _format: Format,
    ) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::Connection("timed out".to_string()))
    }

    async fn write_tile(
        &self,
        _data: Bytes,
        _coord: Coordinate,
        _format: Format,
    ) -> Result<(), StoreError> {
        Err(StoreError::Connection("timed out".to_string()))
    }
}

// =============================================================================
// Mock Health Check
// =============================================================================

pub struct StaticHealthCheck {
    pub healthy: bool,
}

#[async_trait]
impl HealthCheck for StaticHealthCheck {
    async fn check(&self) -> Result<(), HealthError> {
        if self.healthy {
            Ok(())
        } else {
            Err(HealthError::Unavailable("database".to_string()))
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A router wired to inspectable collaborators.
pub struct TestServer {
    pub router: Router,
    pub fetcher: CountingFetcher,
    pub store: Arc<MemoryStore>,
    pub index: Arc<MemoryTilesOfInterest>,
    pub pool: BackgroundPool,
}

impl TestServer {
    /// Counting fetcher, built-in formatters, an empty memory store and a
    /// memory index.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let fetcher = CountingFetcher::new();
        let store = Arc::new(store);
        let index = Arc::new(MemoryTilesOfInterest::new());
        let pool = BackgroundPool::new(2, 64);

        let pipeline = FetchPipeline::new(Arc::new(fetcher.clone()), Arc::new(FormatProcessor));
        let state = AppState::new(test_layers(), pipeline, pool.clone())
            .with_store(store.clone())
            .with_tiles_of_interest(index.clone());

        Self {
            router: create_router(state, RouterConfig::new().with_tracing(false)),
            fetcher,
            store,
            index,
            pool,
        }
    }

    /// Issue a GET and wait for any background work it scheduled.
    pub async fn get(&self, uri: &str) -> (Response<Body>, Bytes) {
        let response = send(&self.router, get(uri)).await;
        self.pool.wait_idle().await;
        split(response).await
    }
}

/// Build a router without a store or index around `pipeline`.
pub fn bare_router(pipeline: FetchPipeline) -> Router {
    let state = AppState::new(test_layers(), pipeline, BackgroundPool::new(1, 8));
    create_router(state, RouterConfig::new().with_tracing(false))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

/// Separate the head from the collected body.
pub async fn split(response: Response<Body>) -> (Response<Body>, Bytes) {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    (Response::from_parts(parts, Body::empty()), bytes)
}
