//! Tile processing and the fetch pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{EncodeError, TileError};
use crate::format::{FeatureLayer, Format};
use crate::layer::LayerDatum;
use crate::tile::{Bounds, Coordinate};

use super::fetch::DataFetcher;

/// One encoded tile produced by a [`TileProcessor`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedTile {
    pub format: Format,
    pub data: Bytes,
}

/// Turns fetched feature layers into encoded tiles.
///
/// Implementations return one [`FormattedTile`] per requested format. Any
/// post-processing of the feature layers belongs to the implementation.
#[async_trait]
pub trait TileProcessor: Send + Sync {
    async fn process(
        &self,
        coord: Coordinate,
        feature_layers: &[FeatureLayer],
        formats: &[Format],
        unpadded_bounds: Bounds,
        padded_bounds: Bounds,
    ) -> Result<Vec<FormattedTile>, EncodeError>;
}

/// Encodes feature layers with the built-in formatters, unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatProcessor;

#[async_trait]
impl TileProcessor for FormatProcessor {
    async fn process(
        &self,
        coord: Coordinate,
        feature_layers: &[FeatureLayer],
        formats: &[Format],
        unpadded_bounds: Bounds,
        _padded_bounds: Bounds,
    ) -> Result<Vec<FormattedTile>, EncodeError> {
        let bounds_wgs84 = unpadded_bounds.to_wgs84();
        formats
            .iter()
            .map(|&format| -> Result<FormattedTile, EncodeError> {
                let data =
                    format.format_tile(feature_layers, coord, unpadded_bounds, bounds_wgs84)?;
                Ok(FormattedTile { format, data })
            })
            .collect()
    }
}

/// Full computation of a tile: fetch the layers, then format them.
#[derive(Clone)]
pub struct FetchPipeline {
    fetcher: Arc<dyn DataFetcher>,
    processor: Arc<dyn TileProcessor>,
}

impl FetchPipeline {
    pub fn new(fetcher: Arc<dyn DataFetcher>, processor: Arc<dyn TileProcessor>) -> Self {
        Self { fetcher, processor }
    }

    /// Compute the tile payload for `coord` in `format`.
    ///
    /// The processor must return exactly one tile; any other count is an
    /// internal error.
    pub async fn run(
        &self,
        coord: Coordinate,
        layers: &[Arc<LayerDatum>],
        format: Format,
    ) -> Result<Bytes, TileError> {
        let fetched = self.fetcher.fetch(coord, layers).await?;
        debug!(
            coord = %coord,
            layers = fetched.feature_layers.len(),
            "Fetched feature layers"
        );

        let mut tiles = self
            .processor
            .process(
                coord,
                &fetched.feature_layers,
                &[format],
                fetched.unpadded_bounds,
                fetched.padded_bounds,
            )
            .await?;

        if tiles.len() != 1 {
            return Err(TileError::UnexpectedTileCount {
                expected: 1,
                actual: tiles.len(),
            });
        }
        Ok(tiles.swap_remove(0).data)
    }
}
