//! Liveness probing for the configurable health-check path.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::HealthError;
use crate::layer::LayerConfig;

/// A liveness probe. `Ok` means the server can serve tiles.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), HealthError>;
}

/// Checks that every layer source file is still readable.
#[derive(Debug, Clone, Default)]
pub struct SourceHealthCheck {
    sources: Vec<PathBuf>,
}

impl SourceHealthCheck {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }

    /// Probe the sources of every registered layer.
    pub fn from_config(config: &LayerConfig) -> Self {
        Self::new(
            config
                .layers()
                .iter()
                .filter_map(|d| d.query.source.clone())
                .collect(),
        )
    }
}

#[async_trait]
impl HealthCheck for SourceHealthCheck {
    async fn check(&self) -> Result<(), HealthError> {
        for source in &self.sources {
            let metadata = tokio::fs::metadata(source)
                .await
                .map_err(|e| HealthError::Unavailable(format!("{}: {}", source.display(), e)))?;
            if !metadata.is_file() {
                return Err(HealthError::Unavailable(format!(
                    "{}: not a file",
                    source.display()
                )));
            }
        }
        Ok(())
    }
}
