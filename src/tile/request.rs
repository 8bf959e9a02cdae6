//! Parsing tile request paths.
//!
//! The grammar is `/<layer-spec>/<zoom>/<column>/<row>.<ext>`. Splitting on
//! `/` must produce exactly five segments (the leading empty segment from
//! the root slash counts), and the last segment must split on `.` into
//! exactly a row and an extension.

use std::fmt;

use crate::format::Format;

use super::coord::Coordinate;

/// A successfully parsed tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestData {
    /// Raw layer spec, e.g. `all` or `water,buildings`
    pub layer_spec: String,

    /// The requested tile; always valid
    pub coord: Coordinate,

    /// Output format resolved from the extension
    pub format: Format,
}

/// Serializes back to the request path.
impl fmt::Display for RequestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}.{}",
            self.layer_spec,
            self.coord.zoom,
            self.coord.column,
            self.coord.row,
            self.format.extension()
        )
    }
}

/// Parse a request path into its layer spec, coordinate and format.
///
/// Returns `None` for any path that does not match the grammar, names an
/// unknown extension, or addresses a coordinate outside the pyramid.
pub fn parse_request_path(path: &str) -> Option<RequestData> {
    let parts: Vec<&str> = path.split('/').collect();
    let [_, layer_spec, zoom, column, row_and_ext] = parts.as_slice() else {
        return None;
    };

    let row_fields: Vec<&str> = row_and_ext.split('.').collect();
    let [row, ext] = row_fields.as_slice() else {
        return None;
    };

    let format = Format::from_extension(ext)?;
    let coord = Coordinate::parse(zoom, column, row).ok()?;
    if !coord.is_valid() {
        return None;
    }

    Some(RequestData {
        layer_spec: layer_spec.to_string(),
        coord,
        format,
    })
}
