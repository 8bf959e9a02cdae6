//! Layer registry and layer-spec resolution.
//!
//! The registry ([`LayerConfig`]) is built once at startup and shared
//! read-only. Requests name their layers with a comma-separated layer spec
//! which [`resolve_layer_spec`] expands against the registry.

mod registry;
mod resolve;

pub use registry::{LayerConfig, LayerDatum, LayerQuery};
pub use resolve::{resolve_layer_spec, ALL_LAYERS};
