use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::format::Format;
use crate::tile::Coordinate;

use super::{tile_key, TileStore};

/// Tiles as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a tile.
    pub fn tile_path(&self, coord: Coordinate, format: Format) -> PathBuf {
        self.root.join(tile_key(coord, format))
    }
}

#[async_trait]
impl TileStore for DirectoryStore {
    async fn read_tile(
        &self,
        coord: Coordinate,
        format: Format,
    ) -> Result<Option<Bytes>, StoreError> {
        let path = self.tile_path(coord, format);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    async fn write_tile(
        &self,
        data: Bytes,
        coord: Coordinate,
        format: Format,
    ) -> Result<(), StoreError> {
        let path = self.tile_path(coord, format);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
    }
}
