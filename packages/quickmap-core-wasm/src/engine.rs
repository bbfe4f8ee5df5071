use js_sys::{Array, Promise};
use wasm_bindgen::prelude::*;

// Duck-typed binding for the conversion engine the page hands us. Any JS
// object with the gdal3.js surface (open / ogr2ogr / getFileBytes) works;
// the pipeline never looks past these three calls.
#[wasm_bindgen]
extern "C" {
    pub type ConversionEngine;

    /// Opens one file or an array of files, resolving to `{ datasets: [...] }`.
    #[wasm_bindgen(method, catch)]
    pub fn open(this: &ConversionEngine, input: &JsValue) -> Result<Promise, JsValue>;

    /// Runs a format conversion on a dataset with ogr2ogr-style arguments.
    #[wasm_bindgen(method, catch, js_name = ogr2ogr)]
    pub fn convert(
        this: &ConversionEngine,
        dataset: &JsValue,
        args: &Array,
    ) -> Result<Promise, JsValue>;

    /// Fetches the byte buffer of a finished conversion.
    #[wasm_bindgen(method, catch, js_name = getFileBytes)]
    pub fn get_bytes(this: &ConversionEngine, result: &JsValue) -> Result<Promise, JsValue>;
}

pub fn conversion_args(items: &[&str]) -> Array {
    let args = Array::new();
    for item in items {
        args.push(&JsValue::from_str(item));
    }
    args
}
