//! Router construction for the tile server.
//!
//! There is a single fallback route; [`tile_handler`] does its own path
//! matching so that layer specs containing `/`-free punctuation and
//! percent-encoded characters reach the parser untouched. Tiles are public,
//! so every response allows any origin.
//!
//! # Example
//!
//! ```ignore
//! use tile_server::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(layer_config, pipeline, pool).with_store(store);
//! let router = create_router(state, RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use super::handlers::{tile_handler, AppState};

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Tracing is enabled by default.
    pub fn new() -> Self {
        Self {
            enable_tracing: true,
        }
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the application router.
///
/// Panics inside a handler are turned into a plain 500 response.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let router = Router::new()
        .fallback(tile_handler)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(build_cors_layer());

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .max_age(Duration::from_secs(86400))
}

fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!(panic = message, "Handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        "Internal Server Error",
    )
        .into_response()
}
