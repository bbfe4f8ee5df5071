use std::sync::Once;

use js_sys::Array;
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{File, HtmlCanvasElement};

pub mod console;
pub mod engine;
pub mod error;
pub mod file_types;
pub mod geometry;
pub mod module_state;
pub mod pipeline;
pub mod render;

pub use engine::ConversionEngine;

use error::MapError;
use module_state::ModuleState;
use render::{PageSize, RenderRequest};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("quickmap core initialized");
    });
}

/// Extension gate for the upload control.
#[wasm_bindgen]
pub fn is_file_type_supported(filename: &str) -> bool {
    file_types::is_file_type_supported(filename)
}

/// Checks a multi-file upload for shapefile completeness. Returns
/// `{ isValid, validFiles, errorMessage }` with the original File objects
/// the caller should keep.
#[wasm_bindgen]
pub fn validate_shapefile(files: &Array) -> Result<JsValue, JsValue> {
    let names: Vec<String> = files
        .iter()
        .map(|entry| {
            entry
                .dyn_ref::<File>()
                .map(|file| file.name())
                .unwrap_or_default()
        })
        .collect();

    let validation = file_types::validate_shapefile(&names);

    let valid_files = Array::new();
    for &index in &validation.kept {
        valid_files.push(&files.get(index as u32));
    }

    let result = js_sys::Object::new();
    js_sys::Reflect::set(
        &result,
        &JsValue::from_str("isValid"),
        &JsValue::from_bool(validation.is_valid),
    )?;
    js_sys::Reflect::set(&result, &JsValue::from_str("validFiles"), &valid_files)?;
    js_sys::Reflect::set(
        &result,
        &JsValue::from_str("errorMessage"),
        &validation
            .error_message
            .map(|msg| JsValue::from_str(&msg))
            .unwrap_or(JsValue::NULL),
    )?;
    Ok(result.into())
}

/// Normalizes an upload into target-CRS features, stores them as the
/// session's user data, and returns them. `files` is a single File or an
/// array of shapefile components.
#[wasm_bindgen]
pub async fn process_geospatial_file(
    engine: ConversionEngine,
    files: JsValue,
) -> Result<JsValue, JsValue> {
    if let Some(file) = files.dyn_ref::<File>() {
        if !file_types::is_file_type_supported(&file.name()) {
            return Err(MapError::UnsupportedFileType(file.name()).into());
        }
    } else if let Some(list) = files.dyn_ref::<Array>() {
        let names: Vec<String> = list
            .iter()
            .map(|entry| {
                entry
                    .dyn_ref::<File>()
                    .map(|file| file.name())
                    .unwrap_or_default()
            })
            .collect();
        let validation = file_types::validate_shapefile(&names);
        if !validation.is_valid {
            let message = validation.error_message.unwrap_or_default();
            return Err(MapError::IncompleteShapefile(message).into());
        }
    }

    let features = pipeline::process_geospatial_file(&engine, &files).await?;
    console_log!("Upload processed into {} features", features.len());

    let result = serde_wasm_bindgen::to_value(&features)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    ModuleState::with_mut(|state| state.set_user_features(features));
    Ok(result)
}

/// Loads the startup basemap through the same pipeline and selects the
/// boundary feature whose `properties[boundary_property]` equals
/// `boundary_value`. Returns whether the boundary was found.
#[wasm_bindgen]
pub async fn load_base_data(
    engine: ConversionEngine,
    file: JsValue,
    boundary_property: String,
    boundary_value: String,
) -> Result<JsValue, JsValue> {
    let features = pipeline::process_geospatial_file(&engine, &file).await?;
    console_log!("Base data loaded: {} features", features.len());

    let found = ModuleState::with_mut(|state| {
        state.set_base_data(features, &boundary_property, &boundary_value)
    });
    if !found {
        console_log!(
            "No boundary feature with {} = {}",
            boundary_property,
            boundary_value
        );
    }
    Ok(JsValue::from_bool(found))
}

#[wasm_bindgen]
pub fn has_base_data() -> bool {
    ModuleState::with(|state| state.has_base_data())
}

#[wasm_bindgen]
pub fn clear_session() {
    ModuleState::with_mut(|state| state.clear());
}

#[derive(Deserialize)]
struct FigureOptions {
    #[serde(default)]
    size: Option<PageSize>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    attribution: Option<String>,
}

/// Renders the figure for the current session onto the given canvas.
/// `options` is `{ size: "a3"|"a4"|"a5", title?, attribution? }`. Refuses
/// when the basemap has not finished loading or no size was chosen.
#[wasm_bindgen]
pub fn generate_figure(canvas: &HtmlCanvasElement, options: JsValue) -> Result<(), JsValue> {
    let options: FigureOptions =
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let size = options.size.ok_or(MapError::MissingPageSize)?;

    let request = ModuleState::with(|state| -> Result<RenderRequest, MapError> {
        let base_features = state.base_features.clone().ok_or(MapError::MissingBaseData)?;
        let boundary = state.boundary.clone().ok_or(MapError::MissingBaseData)?;
        Ok(RenderRequest {
            base_features,
            boundary,
            user_features: state.user_features.clone(),
            size,
            title: options.title,
            attribution: options.attribution,
        })
    })?;

    render::render_map(canvas, &request)
}

/// Data-URL export of the rendered canvas; `format` is `png` or `jpeg`.
#[wasm_bindgen]
pub fn export_image(canvas: &HtmlCanvasElement, format: &str) -> Result<String, JsValue> {
    render::export_image(canvas, format)
}
