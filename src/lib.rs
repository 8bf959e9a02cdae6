//! # Tile Server
//!
//! An HTTP map tile server. Each request names a set of layers, a tile
//! coordinate and an output format; the server answers with the encoded
//! tile for exactly those layers.
//!
//! ## Features
//!
//! - **Layer subsets**: `/water,roads/3/2/3.json` serves two layers, `all`
//!   expands to the configured composite set
//! - **Composite reconstruction**: subset tiles are cut from a cached `all`
//!   tile when one exists, skipping the data sources entirely
//! - **Write-back**: computed `all` tiles are stored for later
//!   reconstruction, off the request path
//! - **Tiles of interest**: served coordinates are indexed for regeneration
//! - **Formats**: GeoJSON (`json`) and Mapbox Vector Tiles (`mvt`)
//!
//! ## Architecture
//!
//! - [`tile`] - Coordinates, request paths, and mercator bounds
//! - [`layer`] - Layer registry and layer-spec resolution
//! - [`mod@format`] - Tile formats and the WKB geometry codec
//! - [`pipeline`] - Fetching, formatting, reconstruction, background work
//! - [`store`] - Tile stores and the tiles-of-interest index
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_server::{
//!     create_router, AppState, BackgroundPool, DirectoryStore, FetchPipeline, FormatProcessor,
//!     GeoJsonFetcher, LayerConfig, RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let layers = Arc::new(LayerConfig::from_file("layers.json".as_ref())?);
//!     let pool = BackgroundPool::new(layers.len().max(1), 1024);
//!     let fetcher = GeoJsonFetcher::from_config(&layers, 0.0)?.with_pool(pool.clone());
//!     let pipeline = FetchPipeline::new(Arc::new(fetcher), Arc::new(FormatProcessor));
//!
//!     let state = AppState::new(layers, pipeline, pool)
//!         .with_store(Arc::new(DirectoryStore::new("/var/cache/tiles")));
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod layer;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{
    CoordError, EncodeError, FetchError, GeometryError, HealthError, IndexError,
    LayerConfigError, StoreError, TileError,
};
pub use format::{Feature, FeatureLayer, Format, Geometry, Properties};
pub use layer::{resolve_layer_spec, LayerConfig, LayerDatum, LayerQuery, ALL_LAYERS};
pub use pipeline::{
    BackgroundPool, CacheReconstructor, DataFetcher, FetchPipeline, FetchResult, FormatProcessor,
    FormattedTile, GeoJsonFetcher, SideEffectScheduler, TileProcessor, MAX_CACHED_ZOOM,
    TOI_ANCESTOR_ZOOM,
};
pub use server::{create_router, AppState, HealthCheck, RouterConfig, SourceHealthCheck};
pub use store::{
    create_s3_client, DirectoryStore, FileTilesOfInterest, MemoryTilesOfInterest, S3Store,
    TileStore, TilesOfInterest,
};
pub use tile::{parse_request_path, Bounds, Coordinate, RequestData};
