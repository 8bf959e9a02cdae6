//! Persistent tile storage and the tiles-of-interest index.
//!
//! # Key Layout
//!
//! Both stores address a tile by `<zoom>/<column>/<row>.<ext>`:
//!
//! ```text
//! DirectoryStore:  <root>/3/2/3.json
//! S3Store:         s3://<bucket>/<path>/3/2/3.json
//! ```

mod directory;
mod interest;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::format::Format;
use crate::tile::Coordinate;

pub use directory::DirectoryStore;
pub use interest::{FileTilesOfInterest, MemoryTilesOfInterest, TilesOfInterest};
pub use s3::{create_s3_client, S3Store, DEFAULT_S3_PATH};

/// Storage for encoded tiles keyed by coordinate and format.
///
/// Writes overwrite wholesale; concurrent writers to the same key race and
/// the last one wins.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Read a stored tile. A missing tile is `Ok(None)`.
    async fn read_tile(&self, coord: Coordinate, format: Format)
        -> Result<Option<Bytes>, StoreError>;

    /// Store a tile, replacing any previous payload.
    async fn write_tile(
        &self,
        data: Bytes,
        coord: Coordinate,
        format: Format,
    ) -> Result<(), StoreError>;
}

/// Relative key of a tile: `<zoom>/<column>/<row>.<ext>`.
pub fn tile_key(coord: Coordinate, format: Format) -> String {
    format!("{}.{}", coord, format.extension())
}
