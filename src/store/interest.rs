//! Tiles-of-interest index.
//!
//! The index records coordinates that should be regenerated when upstream
//! data changes. Entries are only ever added here.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::IndexError;
use crate::tile::Coordinate;

/// Set of coordinates to regenerate on data changes.
#[async_trait]
pub trait TilesOfInterest: Send + Sync {
    async fn index_coord(&self, coord: Coordinate) -> Result<(), IndexError>;
}

/// In-process index.
#[derive(Debug, Default)]
pub struct MemoryTilesOfInterest {
    coords: Mutex<BTreeSet<Coordinate>>,
}

impl MemoryTilesOfInterest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, coord: &Coordinate) -> bool {
        self.coords
            .lock()
            .map(|coords| coords.contains(coord))
            .unwrap_or(false)
    }

    /// Snapshot of the indexed coordinates, sorted.
    pub fn coords(&self) -> Vec<Coordinate> {
        self.coords
            .lock()
            .map(|coords| coords.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TilesOfInterest for MemoryTilesOfInterest {
    async fn index_coord(&self, coord: Coordinate) -> Result<(), IndexError> {
        let mut coords = self
            .coords
            .lock()
            .map_err(|e| IndexError::Io(e.to_string()))?;
        coords.insert(coord);
        Ok(())
    }
}

/// Append-only index file with one `zoom/column/row` line per entry.
///
/// Duplicates are allowed in the file; readers collapse them.
#[derive(Debug)]
pub struct FileTilesOfInterest {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileTilesOfInterest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every distinct coordinate in the file.
    ///
    /// Malformed lines are skipped. A missing file is an empty index.
    pub async fn read_coords(&self) -> Result<BTreeSet<Coordinate>, IndexError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(IndexError::Io(format!("{}: {}", self.path.display(), e))),
        };
        Ok(text
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.trim().split('/').collect();
                match parts.as_slice() {
                    [z, x, y] => Coordinate::parse(z, x, y).ok(),
                    _ => None,
                }
            })
            .collect())
    }
}

#[async_trait]
impl TilesOfInterest for FileTilesOfInterest {
    async fn index_coord(&self, coord: Coordinate) -> Result<(), IndexError> {
        let io_err = |e: std::io::Error| IndexError::Io(format!("{}: {}", self.path.display(), e));

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(format!("{}\n", coord).as_bytes())
            .await
            .map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}
