use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::LayerConfigError;

/// How a layer's features are obtained.
///
/// Only the data fetcher interprets this; the request pipeline treats it as
/// opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LayerQuery {
    /// GeoJSON source file in WGS84
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Lowest zoom at which the layer has data
    #[serde(default)]
    pub min_zoom: i64,

    /// Highest zoom at which the layer has data
    #[serde(default)]
    pub max_zoom: Option<i64>,
}

impl LayerQuery {
    /// Whether the layer has data at `zoom`.
    pub fn admits(&self, zoom: i64) -> bool {
        zoom >= self.min_zoom && self.max_zoom.map_or(true, |max| zoom <= max)
    }
}

/// A named layer definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerDatum {
    pub name: String,

    #[serde(flatten)]
    pub query: LayerQuery,
}

impl LayerDatum {
    pub fn new(name: impl Into<String>, query: LayerQuery) -> Self {
        Self {
            name: name.into(),
            query,
        }
    }
}

/// The registry of known layers.
///
/// `all_layers` lists the layers that make up an `all` request, sorted by
/// name. It may be a subset of the registry: layers outside it can still be
/// requested by name.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    all_layers: Vec<Arc<LayerDatum>>,
    layers_by_name: HashMap<String, Arc<LayerDatum>>,
}

/// On-disk registry layout.
#[derive(Debug, Deserialize)]
struct LayerFile {
    #[serde(default)]
    all: Option<Vec<String>>,
    layers: Vec<LayerDatum>,
}

impl LayerConfig {
    /// Build the registry from layer definitions and the names forming `all`.
    pub fn new<I, S>(all_layer_names: I, layer_data: Vec<LayerDatum>) -> Result<Self, LayerConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut layers_by_name = HashMap::with_capacity(layer_data.len());
        for datum in layer_data {
            let name = datum.name.clone();
            if layers_by_name.insert(name.clone(), Arc::new(datum)).is_some() {
                return Err(LayerConfigError::DuplicateLayer(name));
            }
        }

        let mut names: Vec<String> = all_layer_names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        let all_layers = names
            .into_iter()
            .map(|name| {
                layers_by_name
                    .get(&name)
                    .cloned()
                    .ok_or(LayerConfigError::UnknownLayer(name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            all_layers,
            layers_by_name,
        })
    }

    /// Build a registry where `all` covers every layer.
    pub fn with_all(layer_data: Vec<LayerDatum>) -> Result<Self, LayerConfigError> {
        let names: Vec<String> = layer_data.iter().map(|d| d.name.clone()).collect();
        Self::new(names, layer_data)
    }

    /// Load a registry from a JSON file.
    ///
    /// Relative `source` paths are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, LayerConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| LayerConfigError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let file: LayerFile =
            serde_json::from_str(&contents).map_err(|e| LayerConfigError::Parse {
                path: display,
                message: e.to_string(),
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let layers: Vec<LayerDatum> = file
            .layers
            .into_iter()
            .map(|mut datum| {
                if let Some(source) = datum.query.source.take() {
                    datum.query.source = Some(if source.is_relative() {
                        base.join(source)
                    } else {
                        source
                    });
                }
                datum
            })
            .collect();

        match file.all {
            Some(all) => Self::new(all, layers),
            None => Self::with_all(layers),
        }
    }

    /// Layers that make up an `all` request, sorted by name.
    pub fn all_layers(&self) -> &[Arc<LayerDatum>] {
        &self.all_layers
    }

    /// Look up a layer by name.
    pub fn get(&self, name: &str) -> Option<&Arc<LayerDatum>> {
        self.layers_by_name.get(name)
    }

    /// Every registered layer, sorted by name.
    pub fn layers(&self) -> Vec<Arc<LayerDatum>> {
        let mut layers: Vec<_> = self.layers_by_name.values().cloned().collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name));
        layers
    }

    pub fn len(&self) -> usize {
        self.layers_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers_by_name.is_empty()
    }
}
