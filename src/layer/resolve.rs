use std::collections::BTreeSet;
use std::sync::Arc;

use super::{LayerConfig, LayerDatum};

/// Layer spec token that stands for every layer in the `all` list.
pub const ALL_LAYERS: &str = "all";

/// Expand a layer spec into the layers it names.
///
/// `all` resolves to the registry's `all` list. Otherwise the spec is split
/// on commas; every `all` token contributes the whole `all` list, duplicates
/// collapse, and the result is sorted by name. A single unknown name fails
/// the whole resolution.
pub fn resolve_layer_spec(layer_spec: &str, config: &LayerConfig) -> Option<Vec<Arc<LayerDatum>>> {
    if layer_spec == ALL_LAYERS {
        return Some(config.all_layers().to_vec());
    }

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for token in layer_spec.split(',') {
        if token == ALL_LAYERS {
            names.extend(config.all_layers().iter().map(|d| d.name.as_str()));
        } else {
            names.insert(token);
        }
    }
    names.remove(ALL_LAYERS);

    names
        .into_iter()
        .map(|name| config.get(name).cloned())
        .collect()
}
