//! Tile server binary.
//!
//! Loads the layer registry, wires the fetch pipeline to the optional
//! store, tiles-of-interest index and health check, and serves HTTP.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_server::{
    config::{Config, StoreKind},
    layer::LayerConfig,
    pipeline::{BackgroundPool, FetchPipeline, FormatProcessor, GeoJsonFetcher},
    server::{create_router, AppState, RouterConfig, SourceHealthCheck},
    store::{create_s3_client, DirectoryStore, FileTilesOfInterest, S3Store, TileStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let layer_config = match LayerConfig::from_file(&config.layers_config) {
        Ok(layer_config) => Arc::new(layer_config),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let workers = config.workers_for(layer_config.len());

    info!("tile-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Layers: {} ({} in all)",
        layer_config.len(),
        layer_config.all_layers().len()
    );
    info!("  Padding: {}", config.padding);
    info!(
        "  Background pool: {} workers, queue depth {}",
        workers, config.queue_depth
    );

    let pool = BackgroundPool::new(workers, config.queue_depth);

    let fetcher = match GeoJsonFetcher::from_config(&layer_config, config.padding) {
        Ok(fetcher) => fetcher.with_pool(pool.clone()),
        Err(e) => {
            error!("Failed to load layer sources: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let pipeline = FetchPipeline::new(Arc::new(fetcher), Arc::new(FormatProcessor));

    let mut state = AppState::new(Arc::clone(&layer_config), pipeline, pool.clone());

    match build_store(&config).await {
        Some(store) => state = state.with_store(store),
        None => warn!("  Store: none (no reconstruction, no write-back)"),
    }

    match &config.toi_path {
        Some(path) => {
            info!("  Tiles of interest: {}", path.display());
            state = state.with_tiles_of_interest(Arc::new(FileTilesOfInterest::new(path)));
        }
        None => info!("  Tiles of interest: disabled"),
    }

    if let Some(url) = &config.health_url {
        info!("  Health check: {}", url);
        state = state.with_health_check(
            url.clone(),
            Arc::new(SourceHealthCheck::from_config(&layer_config)),
        );
    }

    let router = create_router(state, RouterConfig::new().with_tracing(!config.no_tracing));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Waiting for {} background job(s)", pool.in_flight());
    pool.wait_idle().await;

    ExitCode::SUCCESS
}

/// Build the configured store, logging its settings.
async fn build_store(config: &Config) -> Option<Arc<dyn TileStore>> {
    match config.store_kind()? {
        StoreKind::Directory(root) => {
            info!("  Store: directory {}", root.display());
            Some(Arc::new(DirectoryStore::new(root)))
        }
        StoreKind::S3 { bucket } => {
            info!(
                "  Store: s3://{}/{} (reduced redundancy: {})",
                bucket, config.store_path, config.store_reduced_redundancy
            );
            if let Some(endpoint) = &config.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.s3_region);
            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            Some(Arc::new(
                S3Store::new(client, bucket)
                    .with_path(config.store_path.clone())
                    .with_reduced_redundancy(config.store_reduced_redundancy),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_server=debug,tower_http=debug"
    } else {
        "tile_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
