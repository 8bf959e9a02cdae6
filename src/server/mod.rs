//! HTTP server layer for the tile server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │         GET /{layer-spec}/{zoom}/{column}/{row}.{ext}           │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │   health    │  │        routes           │  │
//! │  │ (requests)  │  │  (probe)    │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod health;
pub mod routes;

pub use handlers::{compute_etag, etag_matches, tile_handler, tile_response, AppState};
pub use health::{HealthCheck, SourceHealthCheck};
pub use routes::{create_router, RouterConfig};
