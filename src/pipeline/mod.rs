//! The tile computation pipeline.
//!
//! ```text
//!                ┌──────────────────────┐  hit
//!   request ───▶ │ CacheReconstructor   │ ─────────────────────────▶ payload
//!                └──────────┬───────────┘
//!                           │ miss / not applicable
//!                           ▼
//!                ┌──────────────────────┐
//!                │ FetchPipeline        │ ─────────────────────────▶ payload
//!                │ DataFetcher          │            │
//!                │ TileProcessor        │            ▼
//!                └──────────────────────┘  ┌──────────────────────┐
//!                                          │ SideEffectScheduler  │
//!                                          │ (BackgroundPool)     │
//!                                          └──────────────────────┘
//! ```

mod background;
mod fetch;
mod process;
mod reconstruct;
mod side_effects;

pub use background::{BackgroundPool, Job, DEFAULT_QUEUE_DEPTH};
pub use fetch::{DataFetcher, FetchResult, GeoJsonFetcher};
pub use process::{FetchPipeline, FormatProcessor, FormattedTile, TileProcessor};
pub use reconstruct::{CacheReconstructor, CACHE_FORMAT};
pub use side_effects::{interest_coords, should_write_back, SideEffectScheduler};

/// Highest zoom that is stored, reconstructed or indexed.
pub const MAX_CACHED_ZOOM: i64 = 20;

/// Zoom at which regeneration computes tiles; finer tiles are cut from it.
pub const TOI_ANCESTOR_ZOOM: i64 = 18;
