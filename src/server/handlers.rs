//! HTTP request handling for the tile API.
//!
//! Every path is served by [`tile_handler`]:
//!
//! - `GET <health-path>`: `200 OK` text when the health probe passes
//! - `GET /<layer-spec>/<zoom>/<column>/<row>.<ext>`: an encoded tile
//! - anything else: `404 Not Found`
//!
//! Internal failures become a plain `500 Internal Server Error`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info_span, Instrument};

use crate::error::TileError;
use crate::format::Format;
use crate::layer::{resolve_layer_spec, LayerConfig, ALL_LAYERS};
use crate::pipeline::{BackgroundPool, CacheReconstructor, FetchPipeline, SideEffectScheduler};
use crate::store::{TileStore, TilesOfInterest};
use crate::tile::parse_request_path;

use super::health::HealthCheck;

const TEXT_PLAIN: &str = "text/plain";

// =============================================================================
// Application State
// =============================================================================

#[derive(Clone)]
struct HealthRoute {
    path: String,
    check: Arc<dyn HealthCheck>,
}

/// Everything a request needs, fixed at startup.
///
/// The store is optional; without it no reconstruction is attempted and no
/// tiles are written back. Without a tiles-of-interest index nothing is
/// indexed.
#[derive(Clone)]
pub struct AppState {
    layer_config: Arc<LayerConfig>,
    pipeline: FetchPipeline,
    reconstructor: Option<CacheReconstructor>,
    side_effects: SideEffectScheduler,
    health: Option<HealthRoute>,
}

impl AppState {
    pub fn new(layer_config: Arc<LayerConfig>, pipeline: FetchPipeline, pool: BackgroundPool) -> Self {
        Self {
            layer_config,
            pipeline,
            reconstructor: None,
            side_effects: SideEffectScheduler::new(pool),
            health: None,
        }
    }

    /// Use `store` for composite reconstruction and write-back.
    pub fn with_store(mut self, store: Arc<dyn TileStore>) -> Self {
        self.reconstructor = Some(CacheReconstructor::new(Arc::clone(&store)));
        self.side_effects = self.side_effects.with_store(store);
        self
    }

    pub fn with_tiles_of_interest(mut self, index: Arc<dyn TilesOfInterest>) -> Self {
        self.side_effects = self.side_effects.with_tiles_of_interest(index);
        self
    }

    /// Answer `path` with the result of `check`.
    pub fn with_health_check(mut self, path: impl Into<String>, check: Arc<dyn HealthCheck>) -> Self {
        self.health = Some(HealthRoute {
            path: path.into(),
            check,
        });
        self
    }

    pub fn layer_config(&self) -> &LayerConfig {
        &self.layer_config
    }

    /// The pool running background jobs.
    pub fn background_pool(&self) -> &BackgroundPool {
        self.side_effects.pool()
    }

    /// Serve one request path.
    pub async fn handle(&self, path: &str, headers: &HeaderMap) -> Result<Response, TileError> {
        if let Some(health) = &self.health {
            if health.path == path {
                health.check.check().await?;
                return Ok(text_response(StatusCode::OK, "OK"));
            }
        }

        let not_found = || TileError::NotFound {
            path: path.to_string(),
        };
        let request = parse_request_path(path).ok_or_else(not_found)?;
        let layers = resolve_layer_spec(&request.layer_spec, &self.layer_config).ok_or_else(not_found)?;
        let coord = request.coord;
        let format = request.format;

        if let Some(reconstructor) = &self.reconstructor {
            if CacheReconstructor::applies_to(&request.layer_spec, coord) {
                if let Some(data) = reconstructor.try_reconstruct(coord, &layers, format).await? {
                    return Ok(tile_response(data, format, headers));
                }
            }
        }

        let data = self.pipeline.run(coord, &layers, format).await?;
        let is_all = request.layer_spec == ALL_LAYERS;
        self.side_effects
            .schedule(coord, format, is_all, data.clone());
        debug!(coord = %coord, format = format.extension(), bytes = data.len(), "Computed tile");

        Ok(tile_response(data, format, headers))
    }
}

// =============================================================================
// Responses
// =============================================================================

fn text_response(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

/// Strong validator for a payload: the quoted hex SHA-256 digest.
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(data)))
}

/// Whether any `If-None-Match` header matches `etag`.
///
/// Weak comparison: `W/` prefixes are ignored and `*` matches anything.
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

/// Build the response for a tile payload, honoring `If-None-Match`.
pub fn tile_response(data: Bytes, format: Format, request_headers: &HeaderMap) -> Response {
    let etag = compute_etag(&data);

    if etag_matches(request_headers, &etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.mimetype().to_string()),
            (header::ETAG, etag),
        ],
        data,
    )
        .into_response()
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to a plain-text HTTP response.
///
/// 404s are expected traffic and logged at DEBUG; everything else is an
/// internal failure logged at ERROR with the full error chain.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Error handling request: {}", self);
            text_response(status, "Internal Server Error")
        } else {
            debug!(status = status.as_u16(), "{}", self);
            text_response(status, "Not Found")
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve any request path.
///
/// The path is percent-decoded before parsing.
pub async fn tile_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let raw = uri.path();
    let path = urlencoding::decode(raw)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let span = info_span!("tile_request", path = %path);
    match state.handle(&path, &headers).instrument(span.clone()).await {
        Ok(response) => response,
        Err(err) => span.in_scope(|| err.into_response()),
    }
}
