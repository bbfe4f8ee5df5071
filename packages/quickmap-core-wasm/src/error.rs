use std::fmt;

use wasm_bindgen::JsValue;

/// Failure kinds surfaced to the page. Every variant maps to a blocking
/// user notification at the call site; nothing is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// Extension not in the supported upload set.
    UnsupportedFileType(String),
    /// A `.shp` upload is missing one or more mandatory companion files.
    IncompleteShapefile(String),
    /// Converted or uploaded text was not valid JSON (or not valid UTF-8).
    JsonParse(String),
    /// The browser rejected a file read before any conversion started.
    FileRead(String),
    /// The conversion engine's open/convert/getBytes call rejected.
    ConversionEngine(String),
    /// Render requested before the startup basemap load completed.
    MissingBaseData,
    /// Render requested without a page size selection.
    MissingPageSize,
    /// The conversion engine opened the upload but produced no datasets.
    NoDataset,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::UnsupportedFileType(name) => write!(
                f,
                "Unsupported file type: {}. Supported: .gpkg, .shp, .geojson, .json, .kml",
                name
            ),
            MapError::IncompleteShapefile(msg) => write!(f, "{}", msg),
            MapError::JsonParse(msg) => write!(f, "Failed to parse GeoJSON: {}", msg),
            MapError::FileRead(msg) => write!(f, "Failed to read file: {}", msg),
            MapError::ConversionEngine(msg) => write!(f, "Conversion engine error: {}", msg),
            MapError::MissingBaseData => {
                write!(f, "Base data not loaded yet. Please wait and try again.")
            }
            MapError::MissingPageSize => write!(f, "No page size selected"),
            MapError::NoDataset => write!(f, "Conversion engine returned no datasets"),
        }
    }
}

impl From<MapError> for JsValue {
    fn from(err: MapError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

/// Pull a readable message out of a JS rejection value (a string, or an
/// Error-like object with a `message` property).
pub fn rejection_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

impl MapError {
    /// Wrap a rejected engine call, keeping whatever message the JS side
    /// attached to the rejection value.
    pub fn from_engine_rejection(value: JsValue) -> MapError {
        MapError::ConversionEngine(rejection_message(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_names_the_file_and_the_supported_set() {
        let msg = MapError::UnsupportedFileType("image.png".to_string()).to_string();
        assert!(msg.contains("image.png"));
        assert!(msg.contains(".gpkg"));
        assert!(msg.contains(".kml"));
    }

    #[test]
    fn incomplete_shapefile_message_passes_through_verbatim() {
        let msg = MapError::IncompleteShapefile("missing roads.dbf".to_string()).to_string();
        assert_eq!(msg, "missing roads.dbf");
    }
}
