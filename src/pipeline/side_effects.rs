//! Background work scheduled after a tile has been computed.
//!
//! Two independent best-effort jobs, both fire-and-forget on the shared
//! [`BackgroundPool`]:
//!
//! - **Write-back**: `all` tiles up to [`MAX_CACHED_ZOOM`] are stored so
//!   later layer-subset requests can be reconstructed from them.
//! - **Tiles of interest**: served coordinates up to [`MAX_CACHED_ZOOM`] are
//!   indexed for regeneration. Regeneration only recomputes tiles down to
//!   [`TOI_ANCESTOR_ZOOM`] and cuts finer tiles from those, so a finer
//!   coordinate also indexes its ancestor at that zoom.
//!
//! Failures are logged with the coordinate and never retried.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error};

use crate::format::Format;
use crate::store::{TileStore, TilesOfInterest};
use crate::tile::Coordinate;

use super::{BackgroundPool, MAX_CACHED_ZOOM, TOI_ANCESTOR_ZOOM};

/// Coordinates to record in the tiles-of-interest index for `coord`.
pub fn interest_coords(coord: Coordinate) -> Vec<Coordinate> {
    if coord.zoom > MAX_CACHED_ZOOM {
        return Vec::new();
    }
    let mut coords = vec![coord];
    if coord.zoom > TOI_ANCESTOR_ZOOM {
        coords.push(coord.container_at(TOI_ANCESTOR_ZOOM));
    }
    coords
}

/// Whether a computed tile should be written back to the store.
pub fn should_write_back(is_all: bool, coord: Coordinate) -> bool {
    is_all && coord.zoom <= MAX_CACHED_ZOOM
}

/// Submits write-back and indexing jobs.
#[derive(Clone)]
pub struct SideEffectScheduler {
    pool: BackgroundPool,
    store: Option<Arc<dyn TileStore>>,
    tiles_of_interest: Option<Arc<dyn TilesOfInterest>>,
}

impl SideEffectScheduler {
    pub fn new(pool: BackgroundPool) -> Self {
        Self {
            pool,
            store: None,
            tiles_of_interest: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TileStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tiles_of_interest(mut self, index: Arc<dyn TilesOfInterest>) -> Self {
        self.tiles_of_interest = Some(index);
        self
    }

    pub fn pool(&self) -> &BackgroundPool {
        &self.pool
    }

    /// Schedule the jobs that follow a fetched tile. Never waits.
    pub fn schedule(&self, coord: Coordinate, format: Format, is_all: bool, data: Bytes) {
        if let Some(store) = &self.store {
            if should_write_back(is_all, coord) {
                self.schedule_store(Arc::clone(store), data, coord, format);
            }
        }
        if let Some(index) = &self.tiles_of_interest {
            self.schedule_interest(Arc::clone(index), coord);
        }
    }

    fn schedule_store(&self, store: Arc<dyn TileStore>, data: Bytes, coord: Coordinate, format: Format) {
        self.pool.submit(async move {
            match store.write_tile(data, coord, format).await {
                Ok(()) => debug!(coord = %coord, format = format.extension(), "Stored tile"),
                Err(e) => error!(
                    coord = %coord,
                    format = format.extension(),
                    error = %e,
                    "Error storing tile"
                ),
            }
        });
    }

    fn schedule_interest(&self, index: Arc<dyn TilesOfInterest>, coord: Coordinate) {
        let coords = interest_coords(coord);
        if coords.is_empty() {
            return;
        }
        self.pool.submit(async move {
            for target in coords {
                if let Err(e) = index.index_coord(target).await {
                    error!(
                        coord = %coord,
                        indexed = %target,
                        error = %e,
                        "Error updating tiles of interest"
                    );
                    return;
                }
            }
        });
    }
}
