//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Computing tiles through the fetch pipeline
//! - 404s for malformed paths and unknown layers
//! - Response headers, ETags and conditional requests
//! - The health check and internal error mapping

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use serde_json::Value;
use std::sync::Arc;

use tile_server::pipeline::{BackgroundPool, FetchPipeline, GeoJsonFetcher};
use tile_server::server::{compute_etag, create_router, AppState, RouterConfig, SourceHealthCheck};
use tile_server::{Coordinate, Format, FormatProcessor, LayerConfig, LayerDatum, LayerQuery};

use super::test_utils::{
    bare_router, get, send, split, test_layers, CountingFetcher, FailingFetcher,
    FixedCountProcessor, StaticHealthCheck, TestServer,
};

// =============================================================================
// Basic Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_all_layers_tile_computed_and_scheduled() {
    let server = TestServer::new();

    let (response, body) = server.get("/all/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(server.fetcher.call_count(), 1);
    assert_eq!(
        server.fetcher.requested_layers(),
        vec![vec!["buildings", "roads", "water"]]
    );

    let tile: Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = tile.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    assert_eq!(names.len(), 3);
    assert_eq!(tile["water"]["features"][0]["properties"]["layer"], "water");
    assert_eq!(tile["water"]["features"][0]["id"], 3);

    // write-back of the composite and one index entry
    let coord = Coordinate::new(3, 2, 3);
    assert_eq!(server.store.get(coord, Format::Json), Some(body));
    assert_eq!(server.index.coords(), vec![coord]);
}

#[tokio::test]
async fn test_layer_subset_in_sorted_order() {
    let server = TestServer::new();

    let (response, _) = server.get("/water,roads,water/5/10/12.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        server.fetcher.requested_layers(),
        vec![vec!["roads", "water"]]
    );
}

#[tokio::test]
async fn test_mvt_tile() {
    let server = TestServer::new();

    let (response, body) = server.get("/roads/2/1/1.mvt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-protobuf"
    );
    // layer field, length-delimited
    assert_eq!(body[0], 0x1A);
}

#[tokio::test]
async fn test_percent_encoded_layer_spec() {
    let server = TestServer::new();

    let (response, _) = server.get("/roads%2Cwater/1/0/0.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        server.fetcher.requested_layers(),
        vec![vec!["roads", "water"]]
    );
}

#[tokio::test]
async fn test_end_to_end_with_geojson_sources() {
    let water = LayerDatum::new("water", LayerQuery::default());
    let layers = Arc::new(LayerConfig::with_all(vec![water.clone()]).unwrap());

    let pool = BackgroundPool::new(2, 16);
    let mut fetcher = GeoJsonFetcher::new(0.0).with_pool(pool.clone());
    fetcher
        .add_layer_geojson(
            &water,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": 1,
                 "geometry": {"type": "Point", "coordinates": [-122.4, 37.8]},
                 "properties": {"name": "bay"}},
                {"type": "Feature", "id": 2,
                 "geometry": {"type": "Point", "coordinates": [139.7, 35.7]},
                 "properties": {"name": "tokyo bay"}}
            ]}"#,
        )
        .unwrap();

    let pipeline = FetchPipeline::new(Arc::new(fetcher), Arc::new(FormatProcessor));
    let router = create_router(
        AppState::new(layers, pipeline, pool),
        RouterConfig::new().with_tracing(false),
    );

    // western hemisphere, northern half
    let (response, body) = split(send(&router, get("/water/1/0/0.json")).await).await;
    assert_eq!(response.status(), StatusCode::OK);

    let tile: Value = serde_json::from_slice(&body).unwrap();
    let features = tile["water"]["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["name"], "bay");
    assert_eq!(features[0]["id"], 1);
    let lon = features[0]["geometry"]["coordinates"][0].as_f64().unwrap();
    assert!((lon + 122.4).abs() < 1e-6);
}

// =============================================================================
// Not Found
// =============================================================================

#[tokio::test]
async fn test_unknown_layer_not_found() {
    let server = TestServer::new();

    let (response, body) = server.get("/bogus/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(&body[..], b"Not Found");
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(server.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_all_with_unknown_layer_not_found() {
    let server = TestServer::new();

    let (response, _) = server.get("/all,bogus/3/2/3.json").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_coordinate_out_of_range_not_found() {
    let server = TestServer::new();

    let (response, _) = server.get("/all/3/9/3.json").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.fetcher.call_count(), 0);
    assert!(server.index.coords().is_empty());
}

#[tokio::test]
async fn test_malformed_paths_not_found() {
    let server = TestServer::new();

    let paths = [
        "/",
        "/all/3/2/3",
        "/all/3/2/3.png",
        "/all/3/2/3.json.gz",
        "/all/3/2/x.json",
        "/all/-1/0/0.json",
        "/all/3/2/3/4.json",
        "/3/2/3.json",
    ];
    for path in paths {
        let (response, _) = server.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {}", path);
    }
    assert_eq!(server.fetcher.call_count(), 0);
}

// =============================================================================
// Headers and Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_cors_and_etag_headers() {
    let server = TestServer::new();

    let (response, body) = server.get("/water/4/3/2.json").await;

    let headers = response.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert_eq!(
        headers.get(header::ETAG).unwrap().to_str().unwrap(),
        compute_etag(&body)
    );
}

#[tokio::test]
async fn test_if_none_match_returns_not_modified() {
    let server = TestServer::new();

    let (first, _) = server.get("/roads/4/3/2.json").await;
    let etag = first.headers().get(header::ETAG).unwrap().clone();

    let request = Request::builder()
        .uri("/roads/4/3/2.json")
        .header(header::IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let (second, body) = split(send(&server.router, request).await).await;

    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert_eq!(second.headers().get(header::ETAG).unwrap(), &etag);

    let request = Request::builder()
        .uri("/roads/4/3/2.json")
        .header(header::IF_NONE_MATCH, "\"stale\"")
        .body(Body::empty())
        .unwrap();
    let (third, _) = split(send(&server.router, request).await).await;
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let server = TestServer::new();

    let (first, first_body) = server.get("/buildings,roads/6/20/30.mvt").await;
    let (second, second_body) = server.get("/buildings,roads/6/20/30.mvt").await;

    assert_eq!(first_body, second_body);
    assert_eq!(
        first.headers().get(header::ETAG),
        second.headers().get(header::ETAG)
    );
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_check_ok() {
    let pipeline = FetchPipeline::new(Arc::new(CountingFetcher::new()), Arc::new(FormatProcessor));
    let state = AppState::new(test_layers(), pipeline, BackgroundPool::new(1, 4))
        .with_health_check("/healthz", Arc::new(StaticHealthCheck { healthy: true }));
    let router = create_router(state, RouterConfig::new().with_tracing(false));

    let (response, body) = split(send(&router, get("/healthz")).await).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body[..], b"OK");
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
}

#[tokio::test]
async fn test_health_check_failure_is_internal_error() {
    let pipeline = FetchPipeline::new(Arc::new(CountingFetcher::new()), Arc::new(FormatProcessor));
    let state = AppState::new(test_layers(), pipeline, BackgroundPool::new(1, 4))
        .with_health_check("/healthz", Arc::new(StaticHealthCheck { healthy: false }));
    let router = create_router(state, RouterConfig::new().with_tracing(false));

    let (response, body) = split(send(&router, get("/healthz")).await).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal Server Error");
}

#[tokio::test]
async fn test_health_path_unconfigured_is_not_found() {
    let pipeline = FetchPipeline::new(Arc::new(CountingFetcher::new()), Arc::new(FormatProcessor));
    let router = bare_router(pipeline);

    let (response, _) = split(send(&router, get("/healthz")).await).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_source_health_check_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let check = SourceHealthCheck::new(vec![dir.path().join("missing.geojson")]);
    let pipeline = FetchPipeline::new(Arc::new(CountingFetcher::new()), Arc::new(FormatProcessor));
    let state = AppState::new(test_layers(), pipeline, BackgroundPool::new(1, 4))
        .with_health_check("/health", Arc::new(check));
    let router = create_router(state, RouterConfig::new().with_tracing(false));

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Internal Errors
// =============================================================================

#[tokio::test]
async fn test_unexpected_tile_count_is_internal_error() {
    for count in [0, 2] {
        let pipeline = FetchPipeline::new(
            Arc::new(CountingFetcher::new()),
            Arc::new(FixedCountProcessor { count }),
        );
        let router = bare_router(pipeline);

        let (response, body) = split(send(&router, get("/all/3/2/3.json")).await).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"Internal Server Error");
    }
}

#[tokio::test]
async fn test_fetch_failure_is_internal_error() {
    let pipeline = FetchPipeline::new(Arc::new(FailingFetcher), Arc::new(FormatProcessor));
    let router = bare_router(pipeline);

    let response = send(&router, get("/water/3/2/3.json")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
