//! Configuration management for the tile server.
//!
//! Settings come from command-line arguments, with environment variable
//! fallbacks using the `TILES_` prefix:
//!
//! - `TILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILES_PORT` - Server port (default: 8080)
//! - `TILES_LAYERS_CONFIG` - Layer registry JSON file (required)
//! - `TILES_STORE_TYPE` - `directory` or `s3`
//! - `TILES_STORE_NAME` - Store directory or bucket name
//! - `TILES_STORE_PATH` - S3 key prefix (default: osm)
//! - `TILES_STORE_REDUCED_REDUNDANCY` - S3 storage class (default: true)
//! - `TILES_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `TILES_S3_REGION` - AWS region (default: us-east-1)
//! - `TILES_TOI_PATH` - Tiles-of-interest append log
//! - `TILES_HEALTH_URL` - Health-check path
//! - `TILES_WORKERS` - Background pool capacity (default: number of layers)
//! - `TILES_QUEUE_DEPTH` - Background queue depth (default: 1024)
//! - `TILES_PADDING` - Query bounds margin as a fraction of tile width
//!
//! A store is configured only when both the store type and name are set.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::pipeline::DEFAULT_QUEUE_DEPTH;
use crate::store::DEFAULT_S3_PATH;

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

pub const STORE_TYPE_DIRECTORY: &str = "directory";
pub const STORE_TYPE_S3: &str = "s3";

/// Where computed composite tiles are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Directory(PathBuf),
    S3 { bucket: String },
}

/// Tile server - serves vector map tiles per layer subset.
///
/// Tiles for a subset of layers are cut from cached composite tiles when
/// possible and computed from the layer sources otherwise.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILES_PORT")]
    pub port: u16,

    /// Path answered by the health check. Disabled when unset.
    #[arg(long, env = "TILES_HEALTH_URL")]
    pub health_url: Option<String>,

    // =========================================================================
    // Layers
    // =========================================================================
    /// JSON file describing the available layers.
    #[arg(long, env = "TILES_LAYERS_CONFIG")]
    pub layers_config: PathBuf,

    /// Margin added around each tile's bounds when querying, as a fraction
    /// of the tile width.
    #[arg(long, default_value_t = 0.0, env = "TILES_PADDING")]
    pub padding: f64,

    // =========================================================================
    // Store Configuration
    // =========================================================================
    /// Store backend: `directory` or `s3`.
    #[arg(long, env = "TILES_STORE_TYPE")]
    pub store_type: Option<String>,

    /// Directory path or bucket name for the store.
    #[arg(long, env = "TILES_STORE_NAME")]
    pub store_name: Option<String>,

    /// Key prefix inside the S3 bucket.
    #[arg(long, default_value = DEFAULT_S3_PATH, env = "TILES_STORE_PATH")]
    pub store_path: String,

    /// Write S3 objects with the REDUCED_REDUNDANCY storage class.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "TILES_STORE_REDUCED_REDUNDANCY"
    )]
    pub store_reduced_redundancy: bool,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "TILES_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "TILES_S3_REGION")]
    pub s3_region: String,

    /// Append-only log of tiles of interest. Disabled when unset.
    #[arg(long, env = "TILES_TOI_PATH")]
    pub toi_path: Option<PathBuf>,

    // =========================================================================
    // Background Work
    // =========================================================================
    /// Maximum concurrent background jobs. Defaults to the number of layers.
    #[arg(long, env = "TILES_WORKERS")]
    pub workers: Option<usize>,

    /// Maximum queued background jobs before new ones are dropped.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH, env = "TILES_QUEUE_DEPTH")]
    pub queue_depth: usize,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(store_type) = &self.store_type {
            if store_type != STORE_TYPE_DIRECTORY && store_type != STORE_TYPE_S3 {
                return Err(format!(
                    "Unknown store type {:?}. Expected {} or {}",
                    store_type, STORE_TYPE_DIRECTORY, STORE_TYPE_S3
                ));
            }
        }

        if self.workers == Some(0) {
            return Err("workers must be greater than 0".to_string());
        }
        if self.queue_depth == 0 {
            return Err("queue_depth must be greater than 0".to_string());
        }

        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err("padding must be a non-negative number".to_string());
        }

        if let Some(url) = &self.health_url {
            if !url.starts_with('/') {
                return Err(format!("health_url must start with '/': {:?}", url));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Background pool capacity for a registry of `layer_count` layers.
    pub fn workers_for(&self, layer_count: usize) -> usize {
        self.workers.unwrap_or(layer_count).max(1)
    }

    /// The configured store, if both a type and a name are given.
    ///
    /// Call `validate()` first; an unknown type yields `None`.
    pub fn store_kind(&self) -> Option<StoreKind> {
        let name = self.store_name.as_ref()?;
        match self.store_type.as_deref()? {
            STORE_TYPE_DIRECTORY => Some(StoreKind::Directory(PathBuf::from(name))),
            STORE_TYPE_S3 => Some(StoreKind::S3 {
                bucket: name.clone(),
            }),
            _ => None,
        }
    }
}
