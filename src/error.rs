use http::StatusCode;
use thiserror::Error;

/// Errors parsing a tile coordinate from its textual components
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordError {
    /// A zoom, column, or row component is not an integer
    #[error("Invalid {component}: {value:?} is not an integer")]
    NotNumeric {
        component: &'static str,
        value: String,
    },
}

/// Errors converting between structural and binary geometry encodings
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// A position carries fewer than two ordinates
    #[error("Position has {0} ordinates, need at least 2")]
    ShortPosition(usize),

    /// WKB or vector tile conversion failed
    #[error("Geometry codec error: {0}")]
    Codec(String),
}

impl From<geozero::error::GeozeroError> for GeometryError {
    fn from(err: geozero::error::GeozeroError) -> Self {
        GeometryError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for GeometryError {
    fn from(err: serde_json::Error) -> Self {
        GeometryError::Codec(err.to_string())
    }
}

/// Errors raised by tile formatters
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// A feature's geometry could not be decoded
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Serialization of the output document failed
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Errors from the persistent tile store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors from the spatial data fetcher
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Reading a layer source failed
    #[error("Failed to read source {source_path}: {message}")]
    Source {
        source_path: String,
        message: String,
    },

    /// A layer source did not contain a usable feature collection
    #[error("Invalid source data for layer {layer}: {message}")]
    InvalidSource { layer: String, message: String },

    /// A per-layer query task failed to complete
    #[error("Layer query failed: {0}")]
    Query(String),
}

/// Errors from the tiles-of-interest backend
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Writing the index entry failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the liveness probe
#[derive(Debug, Clone, Error)]
pub enum HealthError {
    /// A probed dependency is unavailable
    #[error("Dependency unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while serving a tile request.
///
/// `NotFound` is the only user-facing variant. Everything else is an
/// internal failure that the router maps to a generic 500.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The path does not match the tile grammar, names an unknown format or
    /// layer, or addresses a coordinate outside the pyramid
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// A cached composite tile could not be decoded
    #[error("Failed to decode cached tile: {message}")]
    CacheDecode { message: String },

    /// The tile processor returned a number of formatted tiles other than
    /// the number of requested formats
    #[error("Unexpected number of tiles: expected {expected}, got {actual}")]
    UnexpectedTileCount { expected: usize, actual: usize },

    /// The data fetcher failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A formatter failed
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The health probe failed
    #[error("Health check failed: {0}")]
    Health(#[from] HealthError),
}

impl TileError {
    /// Whether this error is an expected client error rather than a fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TileError::NotFound { .. })
    }

    /// HTTP status for this error: 404 for client errors, 500 otherwise.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Errors building the layer registry
#[derive(Debug, Clone, Error)]
pub enum LayerConfigError {
    /// A name listed in `all` has no layer definition
    #[error("Unknown layer in all list: {0}")]
    UnknownLayer(String),

    /// Two layer definitions share a name
    #[error("Duplicate layer name: {0}")]
    DuplicateLayer(String),

    /// The registry file could not be read
    #[error("Failed to read layer config {path}: {message}")]
    Read { path: String, message: String },

    /// The registry file is not valid JSON for the expected shape
    #[error("Failed to parse layer config {path}: {message}")]
    Parse { path: String, message: String },
}
