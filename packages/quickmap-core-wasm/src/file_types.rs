use serde::{Deserialize, Serialize};

/// Extensions accepted by the upload control.
const SUPPORTED_EXTENSIONS: [&str; 5] = [".gpkg", ".shp", ".geojson", ".json", ".kml"];

/// Companions every `.shp` must be bundled with.
const MANDATORY_COMPANIONS: [&str; 3] = [".shx", ".dbf", ".prj"];

/// All recognized shapefile component extensions, mandatory and ancillary.
const SHAPEFILE_EXTENSIONS: [&str; 15] = [
    ".shp", ".shx", ".dbf", ".prj", ".sbn", ".sbx", ".fbn", ".fbx", ".ain", ".aih", ".atx",
    ".ixs", ".mxs", ".xml", ".cpg",
];

/// Lower-cased final extension with its leading dot. Multi-dot names use the
/// final segment only; a dotless name yields the whole name as "extension".
pub fn file_extension(name: &str) -> String {
    let segment = name.rsplit('.').next().unwrap_or("");
    format!(".{}", segment.to_lowercase())
}

fn basename(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Case-insensitive extension gate for the fixed supported set.
pub fn is_file_type_supported(name: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&file_extension(name).as_str())
}

/// Outcome of the shapefile companion check. `kept` holds indices into the
/// input list so the interop layer can hand the original File objects back.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShapefileValidation {
    pub is_valid: bool,
    pub kept: Vec<usize>,
    pub error_message: Option<String>,
}

/// Checks a multi-file upload for shapefile completeness.
///
/// Uploads with no `.shp` at all are passed through untouched (they are not
/// a shapefile upload, so there is nothing to validate). When a `.shp` is
/// present, every `.shp` must have same-basename `.shx`, `.dbf` and `.prj`
/// companions; the first incomplete one aborts with a message naming each
/// missing companion file. A complete upload keeps only the recognized
/// shapefile components, silently dropping anything else.
pub fn validate_shapefile(names: &[String]) -> ShapefileValidation {
    let components: Vec<usize> = (0..names.len())
        .filter(|&i| SHAPEFILE_EXTENSIONS.contains(&file_extension(&names[i]).as_str()))
        .collect();

    let shapes: Vec<usize> = components
        .iter()
        .copied()
        .filter(|&i| file_extension(&names[i]) == ".shp")
        .collect();

    if shapes.is_empty() {
        // Not a shapefile upload; decline to validate or filter.
        return ShapefileValidation {
            is_valid: true,
            kept: (0..names.len()).collect(),
            error_message: None,
        };
    }

    for &shp in &shapes {
        let base = basename(&names[shp]);
        let base_lower = base.to_lowercase();

        let missing: Vec<String> = MANDATORY_COMPANIONS
            .iter()
            .filter(|&&companion| {
                !components.iter().any(|&i| {
                    file_extension(&names[i]) == companion
                        && basename(&names[i]).to_lowercase() == base_lower
                })
            })
            .map(|companion| format!("{}{}", base, companion))
            .collect();

        if !missing.is_empty() {
            return ShapefileValidation {
                is_valid: false,
                kept: Vec::new(),
                error_message: Some(format!(
                    "Incomplete shapefile \"{}\": missing {}",
                    names[shp],
                    missing.join(", ")
                )),
            };
        }
    }

    ShapefileValidation {
        is_valid: true,
        kept: components,
        error_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_file_type_supported("data.gpkg"));
        assert!(is_file_type_supported("DATA.SHP"));
        assert!(is_file_type_supported("file.GeoJSON"));
        assert!(is_file_type_supported("notes.json"));
        assert!(is_file_type_supported("route.kml"));
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        assert!(!is_file_type_supported("x.tiff"));
        assert!(!is_file_type_supported("image.png"));
        assert!(!is_file_type_supported("data.txt"));
        assert!(!is_file_type_supported("noextension"));
    }

    #[test]
    fn multi_dot_names_use_final_segment_only() {
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert!(is_file_type_supported("export.2024.geojson"));
        assert!(!is_file_type_supported("export.geojson.bak"));
    }

    #[test]
    fn no_shp_passes_original_list_through() {
        let input = names(&["boundaries.gpkg", "readme.txt"]);
        let result = validate_shapefile(&input);
        assert!(result.is_valid);
        assert_eq!(result.kept, vec![0, 1]);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn missing_dbf_is_reported_by_name() {
        let input = names(&["roads.shp", "roads.shx", "roads.prj"]);
        let result = validate_shapefile(&input);
        assert!(!result.is_valid);
        let message = result.error_message.unwrap();
        assert!(message.contains("roads.dbf"), "got: {}", message);
        assert!(!message.contains("roads.shx"));
    }

    #[test]
    fn all_missing_companions_are_aggregated() {
        let input = names(&["roads.shp"]);
        let result = validate_shapefile(&input);
        assert!(!result.is_valid);
        let message = result.error_message.unwrap();
        for companion in ["roads.shx", "roads.dbf", "roads.prj"] {
            assert!(message.contains(companion), "got: {}", message);
        }
    }

    #[test]
    fn complete_set_keeps_only_shapefile_components() {
        let input = names(&[
            "roads.shp",
            "roads.shx",
            "roads.dbf",
            "roads.prj",
            "roads.cpg",
            "readme.txt",
        ]);
        let result = validate_shapefile(&input);
        assert!(result.is_valid);
        assert_eq!(result.kept, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn basename_matching_is_case_insensitive() {
        let input = names(&["ROADS.SHP", "roads.shx", "Roads.dbf", "roads.PRJ"]);
        let result = validate_shapefile(&input);
        assert!(result.is_valid, "{:?}", result.error_message);
    }

    #[test]
    fn first_incomplete_shp_stops_processing() {
        let input = names(&[
            "a.shp", // incomplete
            "b.shp", // also incomplete, must not be reported
            "b.shx",
        ]);
        let result = validate_shapefile(&input);
        assert!(!result.is_valid);
        let message = result.error_message.unwrap();
        assert!(message.contains("a.shp"));
        assert!(!message.contains("b.dbf"));
    }

    #[test]
    fn two_complete_shapefiles_validate_together() {
        let input = names(&[
            "a.shp", "a.shx", "a.dbf", "a.prj", "b.shp", "b.shx", "b.dbf", "b.prj",
        ]);
        let result = validate_shapefile(&input);
        assert!(result.is_valid);
        assert_eq!(result.kept.len(), 8);
    }
}
