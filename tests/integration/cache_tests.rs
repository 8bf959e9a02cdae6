//! Composite cache integration tests.
//!
//! Tests verify:
//! - Subset requests are cut from a cached composite without fetching
//! - `all` requests never read the cache and always write it back
//! - Undecodable composites are internal errors, not misses
//! - Tiles-of-interest indexing around the zoom 18 and 20 boundaries

use axum::http::{header, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use tile_server::pipeline::{BackgroundPool, FetchPipeline};
use tile_server::server::{create_router, AppState, RouterConfig};
use tile_server::{Coordinate, Format, FormatProcessor};

use super::test_utils::{
    get, send, split, test_layers, BrokenStore, CountingFetcher, MemoryStore, TestServer,
};

const COMPOSITE: &str = r#"{
    "buildings": {"type": "FeatureCollection", "features": [
        {"type": "Feature", "id": 11,
         "geometry": {"type": "Polygon",
                      "coordinates": [[[-44, -44], [-43, -44], [-43, -43], [-44, -44]]]},
         "properties": {"height": 12}}
    ]},
    "roads": {"type": "FeatureCollection", "features": [
        {"type": "Feature",
         "geometry": {"type": "LineString", "coordinates": [[-44, -44], [-43, -43]]},
         "properties": {"kind": "highway"}}
    ]},
    "water": {"type": "FeatureCollection", "features": [
        {"type": "Feature",
         "geometry": {"type": "Point", "coordinates": [-44.5, -44.5]},
         "properties": {"kind": "lake"}}
    ]}
}"#;

fn cached_server(coord: Coordinate) -> TestServer {
    TestServer::with_store(MemoryStore::new().with_tile(coord, Format::Json, COMPOSITE))
}

// =============================================================================
// Reconstruction
// =============================================================================

#[tokio::test]
async fn test_subset_reconstructed_from_composite() {
    let coord = Coordinate::new(3, 2, 3);
    let server = cached_server(coord);

    let (response, body) = server.get("/water,buildings/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.fetcher.call_count(), 0);
    assert_eq!(server.store.read_count(), 1);

    let tile: Value = serde_json::from_slice(&body).unwrap();
    let object = tile.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("water"));
    assert!(object.contains_key("buildings"));

    // ids are dropped across the cache round trip
    let building = &tile["buildings"]["features"][0];
    assert!(building.get("id").is_none());
    assert_eq!(building["properties"]["height"], 12);

    let lon = tile["water"]["features"][0]["geometry"]["coordinates"][0]
        .as_f64()
        .unwrap();
    assert!((lon + 44.5).abs() < 1e-6);

    // reconstruction does not schedule any side effects
    assert_eq!(server.store.write_count(), 0);
    assert!(server.index.coords().is_empty());
}

#[tokio::test]
async fn test_subset_reconstructed_as_mvt() {
    let coord = Coordinate::new(3, 2, 3);
    let server = cached_server(coord);

    let (response, body) = server.get("/roads/3/2/3.mvt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-protobuf"
    );
    assert_eq!(server.fetcher.call_count(), 0);
    assert_eq!(body[0], 0x1A);
}

#[tokio::test]
async fn test_requested_layer_missing_from_composite() {
    let coord = Coordinate::new(3, 2, 3);
    let server = TestServer::with_store(MemoryStore::new().with_tile(
        coord,
        Format::Json,
        r#"{"water": {"type": "FeatureCollection", "features": []}}"#,
    ));

    let (response, body) = server.get("/roads,water/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.fetcher.call_count(), 0);
    let tile: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(tile.as_object().unwrap().len(), 1);
    assert!(tile["water"]["features"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cache_miss_falls_back_to_fetch() {
    let server = cached_server(Coordinate::new(3, 2, 3));

    let (response, _) = server.get("/water/3/2/2.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.fetcher.call_count(), 1);
    // subset tiles are indexed but never written back
    assert_eq!(server.store.write_count(), 0);
    assert_eq!(server.index.coords(), vec![Coordinate::new(3, 2, 2)]);
}

#[tokio::test]
async fn test_store_read_failure_falls_back_to_fetch() {
    let fetcher = CountingFetcher::new();
    let pipeline = FetchPipeline::new(Arc::new(fetcher.clone()), Arc::new(FormatProcessor));
    let pool = BackgroundPool::new(1, 8);
    let state = AppState::new(test_layers(), pipeline, pool.clone()).with_store(Arc::new(BrokenStore));
    let router = create_router(state, RouterConfig::new().with_tracing(false));

    let response = send(&router, get("/water/3/2/3.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetcher.call_count(), 1);

    // write-back failure is logged, not surfaced
    let response = send(&router, get("/all/3/2/3.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    pool.wait_idle().await;
}

#[tokio::test]
async fn test_undecodable_composite_is_internal_error() {
    let coord = Coordinate::new(3, 2, 3);
    let server =
        TestServer::with_store(MemoryStore::new().with_tile(coord, Format::Json, "not json"));

    let (response, body) = server.get("/water/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal Server Error");
    assert_eq!(server.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_no_reconstruction_above_cached_zoom() {
    let coord = Coordinate::new(21, 0, 0);
    let server = cached_server(coord);

    let (response, _) = server.get("/water/21/0/0.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.store.read_count(), 0);
    assert_eq!(server.fetcher.call_count(), 1);
    assert!(server.index.coords().is_empty());
}

#[tokio::test]
async fn test_no_store_always_fetches() {
    let fetcher = CountingFetcher::new();
    let pipeline = FetchPipeline::new(Arc::new(fetcher.clone()), Arc::new(FormatProcessor));
    let router = create_router(
        AppState::new(test_layers(), pipeline, BackgroundPool::new(1, 8)),
        RouterConfig::new().with_tracing(false),
    );

    let (response, _) = split(send(&router, get("/water/3/2/3.json")).await).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetcher.call_count(), 1);
}

// =============================================================================
// Composite Requests and Write-Back
// =============================================================================

#[tokio::test]
async fn test_all_request_never_reads_cache() {
    let coord = Coordinate::new(3, 2, 3);
    let server = cached_server(coord);

    let (response, body) = server.get("/all/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.store.read_count(), 0);
    assert_eq!(server.fetcher.call_count(), 1);

    // the fresh composite replaces the cached one
    assert_eq!(server.store.write_count(), 1);
    assert_eq!(server.store.get(coord, Format::Json), Some(body));
}

#[tokio::test]
async fn test_write_back_then_reconstruct() {
    let server = TestServer::new();

    let (_, composite) = server.get("/all/7/10/20.json").await;
    assert_eq!(server.fetcher.call_count(), 1);

    let (response, body) = server.get("/roads/7/10/20.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.fetcher.call_count(), 1);

    let full: Value = serde_json::from_slice(&composite).unwrap();
    let subset: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        subset["roads"]["features"][0]["properties"],
        full["roads"]["features"][0]["properties"]
    );
}

#[tokio::test]
async fn test_write_back_keyed_by_requested_format() {
    let server = TestServer::new();

    let (_, body) = server.get("/all/4/1/1.mvt").await;

    let coord = Coordinate::new(4, 1, 1);
    assert_eq!(server.store.get(coord, Format::Mvt), Some(body));
    assert_eq!(server.store.get(coord, Format::Json), None);
}

#[tokio::test]
async fn test_no_write_back_above_cached_zoom() {
    let server = TestServer::new();

    let (response, _) = server.get("/all/21/5/5.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.store.write_count(), 0);
}

// =============================================================================
// Tiles of Interest
// =============================================================================

#[tokio::test]
async fn test_index_includes_zoom_18_ancestor() {
    let server = TestServer::new();

    let (response, _) = server.get("/all/19/100/100.mvt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        server.index.coords(),
        vec![Coordinate::new(18, 50, 50), Coordinate::new(19, 100, 100)]
    );
}

#[tokio::test]
async fn test_index_boundaries() {
    let server = TestServer::new();

    server.get("/water/18/7/7.json").await;
    assert_eq!(server.index.coords(), vec![Coordinate::new(18, 7, 7)]);

    server.get("/water/20/1023/4.json").await;
    assert!(server.index.contains(&Coordinate::new(20, 1023, 4)));
    assert!(server.index.contains(&Coordinate::new(18, 255, 1)));
    assert_eq!(server.index.coords().len(), 3);
}
