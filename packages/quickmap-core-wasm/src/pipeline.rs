use js_sys::{Array, Promise, Uint8Array};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::File;

use crate::console_log;
use crate::engine::{conversion_args, ConversionEngine};
use crate::error::{rejection_message, MapError};
use crate::file_types::file_extension;

/// All pipeline output is expressed in British National Grid.
pub const TARGET_CRS: &str = "EPSG:27700";
const TARGET_EPSG_CODE: &str = "27700";

/// True unless the collection declares a CRS name containing the target EPSG
/// code. Substring containment, not exact match: a name merely containing
/// "27700" elsewhere also passes, which is the long-standing behavior this
/// check preserves.
pub fn needs_reprojection(geojson: &Value) -> bool {
    geojson
        .get("crs")
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(Value::as_str)
        .map_or(true, |name| !name.contains(TARGET_EPSG_CODE))
}

/// The collection's `features` array, or the whole document as a single
/// feature when none is present (bare Geometry/Feature pass-through).
pub fn collection_features(mut geojson: Value) -> Vec<Value> {
    if geojson.get("features").is_some_and(Value::is_array) {
        if let Some(Value::Array(features)) = geojson.get_mut("features").map(Value::take) {
            return features;
        }
    }
    vec![geojson]
}

async fn await_engine(call: Result<Promise, JsValue>) -> Result<JsValue, MapError> {
    let promise = call.map_err(MapError::from_engine_rejection)?;
    JsFuture::from(promise)
        .await
        .map_err(MapError::from_engine_rejection)
}

fn parse_geojson(text: &str) -> Result<Value, MapError> {
    serde_json::from_str(text).map_err(|e| MapError::JsonParse(e.to_string()))
}

/// Converts a dataset to GeoJSON through the engine and parses the result.
async fn convert_to_geojson(
    engine: &ConversionEngine,
    dataset: &JsValue,
    args: &[&str],
) -> Result<Value, MapError> {
    let result = await_engine(engine.convert(dataset, &conversion_args(args))).await?;
    let bytes_js = await_engine(engine.get_bytes(&result)).await?;
    let bytes = Uint8Array::new(&bytes_js).to_vec();
    let text =
        String::from_utf8(bytes).map_err(|e| MapError::JsonParse(e.to_string()))?;
    parse_geojson(&text)
}

/// Normalizes an upload (a single file, or shapefile components as an array)
/// into a feature list in the target CRS.
///
/// Single GeoJSON/JSON files already in the target CRS are parsed directly
/// and returned as-is with no engine call. Everything else goes through the
/// engine: open, convert to GeoJSON, and convert again with `-t_srs` if the
/// first pass came back in a foreign CRS.
pub async fn process_geospatial_file(
    engine: &ConversionEngine,
    files: &JsValue,
) -> Result<Vec<Value>, MapError> {
    if !Array::is_array(files) {
        if let Some(file) = files.dyn_ref::<File>() {
            let extension = file_extension(&file.name());
            if extension == ".geojson" || extension == ".json" {
                let text_js = JsFuture::from(file.text())
                    .await
                    .map_err(|e| MapError::FileRead(rejection_message(&e)))?;
                let geojson = parse_geojson(&text_js.as_string().unwrap_or_default())?;
                if !needs_reprojection(&geojson) {
                    return Ok(collection_features(geojson));
                }
                // Foreign CRS: push the same file through the engine instead
                // of returning un-reprojected data.
                console_log!(
                    "{} is not in {}, handing it to the conversion engine",
                    file.name(),
                    TARGET_CRS
                );
            }
        }
    }

    let opened = await_engine(engine.open(files)).await?;
    let datasets = js_sys::Reflect::get(&opened, &JsValue::from_str("datasets"))
        .map_err(MapError::from_engine_rejection)?;
    let datasets: Array = datasets.dyn_into().map_err(|_| MapError::NoDataset)?;
    let dataset = datasets.get(0);
    if dataset.is_undefined() || dataset.is_null() {
        return Err(MapError::NoDataset);
    }

    let mut geojson = convert_to_geojson(engine, &dataset, &["-f", "GeoJSON"]).await?;

    if needs_reprojection(&geojson) {
        console_log!("Reprojecting dataset to {}", TARGET_CRS);
        geojson = convert_to_geojson(
            engine,
            &dataset,
            &["-f", "GeoJSON", "-t_srs", TARGET_CRS],
        )
        .await?;
    }

    Ok(collection_features(geojson))
}
