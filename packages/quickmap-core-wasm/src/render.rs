use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::error::MapError;
use crate::geometry::{calculate_bounds, create_bounding_box, Bounds};

const MM_TO_INCHES: f64 = 1.0 / 25.4;
const DEFAULT_DPI: f64 = 300.0;

/// Negative frame buffer, in target-CRS metres, so the figure crops tightly
/// onto the boundary feature.
const BOUNDARY_FRAME_BUFFER: f64 = -33000.0;

// The map occupies 85% x 75% of the canvas, offset to leave room for the
// title above and attribution below.
const MAP_WIDTH_FRACTION: f64 = 0.85;
const MAP_HEIGHT_FRACTION: f64 = 0.75;
const MAP_X_OFFSET_FRACTION: f64 = 0.075;
const MAP_Y_OFFSET_FRACTION: f64 = 0.15;

const MAX_DISPLAY_HEIGHT: f64 = 800.0;
const JPEG_QUALITY: f64 = 0.9;
const POINT_RADIUS: f64 = 4.5;

/// Physical paper sizes rendered at 300 DPI.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A3,
    A4,
    A5,
}

impl PageSize {
    fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageSize::A3 => (297.0, 420.0),
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
        }
    }

    pub fn pixel_dimensions(self) -> (u32, u32) {
        let (w_mm, h_mm) = self.dimensions_mm();
        (
            (w_mm * MM_TO_INCHES * DEFAULT_DPI).round() as u32,
            (h_mm * MM_TO_INCHES * DEFAULT_DPI).round() as u32,
        )
    }
}

/// Everything a render needs, captured up front. The canvas and context are
/// the only mutable things in play; the request itself never changes.
pub struct RenderRequest {
    pub base_features: Vec<Value>,
    pub boundary: Value,
    pub user_features: Option<Vec<Value>>,
    pub size: PageSize,
    pub title: Option<String>,
    pub attribution: Option<String>,
}

/// Uniform linear fit with Y reflected (CRS north-up to screen down),
/// matching a d3 geoIdentity().reflectY(true).fitSize(...) setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Projection {
    pub fn fit(bounds: &Bounds, width: f64, height: f64) -> Projection {
        let extent_x = bounds.max_x - bounds.min_x;
        let extent_y = bounds.max_y - bounds.min_y;
        let scale = (width / extent_x).min(height / extent_y);
        Projection {
            scale,
            tx: (width - scale * (bounds.min_x + bounds.max_x)) / 2.0,
            ty: (height + scale * (bounds.min_y + bounds.max_y)) / 2.0,
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.tx += dx;
        self.ty += dy;
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.tx + self.scale * x, self.ty - self.scale * y)
    }
}

/// Projection framing the boundary feature: its bounds, inset by the frame
/// buffer, fitted to the map area and offset into place.
pub fn framed_projection(boundary: &Value, width: f64, height: f64) -> Projection {
    let bounds = calculate_bounds(boundary);
    let frame = create_bounding_box(&bounds, BOUNDARY_FRAME_BUFFER);
    let frame_bounds = calculate_bounds(&json!({ "type": "Feature", "geometry": frame }));

    let mut projection = Projection::fit(
        &frame_bounds,
        width * MAP_WIDTH_FRACTION,
        height * MAP_HEIGHT_FRACTION,
    );
    projection.translate(width * MAP_X_OFFSET_FRACTION, height * MAP_Y_OFFSET_FRACTION);
    projection
}

fn coordinate_pair(value: &Value) -> Option<(f64, f64)> {
    let pair = value.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}

fn trace_point(
    ctx: &CanvasRenderingContext2d,
    projection: &Projection,
    coords: &Value,
) -> Result<(), JsValue> {
    if let Some((x, y)) = coordinate_pair(coords) {
        let (px, py) = projection.apply(x, y);
        ctx.move_to(px + POINT_RADIUS, py);
        ctx.arc(px, py, POINT_RADIUS, 0.0, std::f64::consts::TAU)?;
    }
    Ok(())
}

fn trace_line(
    ctx: &CanvasRenderingContext2d,
    projection: &Projection,
    points: &Value,
    close: bool,
) {
    let Some(points) = points.as_array() else {
        return;
    };
    let mut started = false;
    for point in points {
        if let Some((x, y)) = coordinate_pair(point) {
            let (px, py) = projection.apply(x, y);
            if started {
                ctx.line_to(px, py);
            } else {
                ctx.move_to(px, py);
                started = true;
            }
        }
    }
    if close && started {
        ctx.close_path();
    }
}

fn trace_geometry(
    ctx: &CanvasRenderingContext2d,
    projection: &Projection,
    geometry: &Value,
) -> Result<(), JsValue> {
    let geometry_type = geometry.get("type").and_then(Value::as_str).unwrap_or("");
    let Some(coords) = geometry.get("coordinates") else {
        return Ok(());
    };

    match geometry_type {
        "Point" => trace_point(ctx, projection, coords)?,
        "MultiPoint" => {
            for point in coords.as_array().into_iter().flatten() {
                trace_point(ctx, projection, point)?;
            }
        }
        "LineString" => trace_line(ctx, projection, coords, false),
        "MultiLineString" => {
            for line in coords.as_array().into_iter().flatten() {
                trace_line(ctx, projection, line, false);
            }
        }
        "Polygon" => {
            for ring in coords.as_array().into_iter().flatten() {
                trace_line(ctx, projection, ring, true);
            }
        }
        "MultiPolygon" => {
            for polygon in coords.as_array().into_iter().flatten() {
                for ring in polygon.as_array().into_iter().flatten() {
                    trace_line(ctx, projection, ring, true);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn draw_feature(
    ctx: &CanvasRenderingContext2d,
    projection: &Projection,
    feature: &Value,
    fill: bool,
    stroke: bool,
) -> Result<(), JsValue> {
    let Some(geometry) = feature.get("geometry") else {
        return Ok(());
    };
    ctx.begin_path();
    trace_geometry(ctx, projection, geometry)?;
    if fill {
        ctx.fill();
    }
    if stroke {
        ctx.stroke();
    }
    Ok(())
}

fn draw_labels(
    ctx: &CanvasRenderingContext2d,
    width: f64,
    height: f64,
    title: Option<&str>,
    attribution: Option<&str>,
) -> Result<(), JsValue> {
    ctx.set_fill_style(&JsValue::from_str("black"));

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        ctx.set_font(&format!("bold {}px Arial", (width / 20.0).floor()));
        ctx.fill_text(title, width * MAP_X_OFFSET_FRACTION, height * 0.08)?;
    }

    if let Some(attribution) = attribution.filter(|a| !a.is_empty()) {
        ctx.set_font(&format!("{}px Arial", (width / 60.0).floor()));
        ctx.fill_text(attribution, width * MAP_X_OFFSET_FRACTION, height * 0.95)?;
    }

    Ok(())
}

/// On-screen preview sizing: quarter scale, capped at 800px tall, aspect
/// preserved. The raster itself stays at full print resolution.
fn apply_display_size(canvas: &HtmlCanvasElement, width: f64, height: f64) -> Result<(), JsValue> {
    let aspect_ratio = width / height;
    let display_height = MAX_DISPLAY_HEIGHT.min(height / 4.0);
    let display_width = display_height * aspect_ratio;

    let style = canvas.style();
    style.set_property("width", &format!("{}px", display_width))?;
    style.set_property("height", &format!("{}px", display_height))?;
    Ok(())
}

/// Paints a complete figure onto the canvas. Refuses outright when the
/// request has no base features; there is no partial or degraded render.
pub fn render_map(canvas: &HtmlCanvasElement, request: &RenderRequest) -> Result<(), JsValue> {
    if request.base_features.is_empty() {
        return Err(MapError::MissingBaseData.into());
    }

    let (pixel_width, pixel_height) = request.size.pixel_dimensions();
    canvas.set_width(pixel_width);
    canvas.set_height(pixel_height);
    let width = pixel_width as f64;
    let height = pixel_height as f64;
    apply_display_size(canvas, width, height)?;

    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d canvas context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()?;

    let projection = framed_projection(&request.boundary, width, height);

    ctx.set_fill_style(&JsValue::from_str("white"));
    ctx.fill_rect(0.0, 0.0, width, height);

    ctx.set_fill_style(&JsValue::from_str("#f2f2f2"));
    ctx.set_stroke_style(&JsValue::from_str("white"));
    ctx.set_line_width(2.0);
    for feature in &request.base_features {
        draw_feature(&ctx, &projection, feature, true, true)?;
    }

    ctx.set_stroke_style(&JsValue::from_str("dimgrey"));
    ctx.set_line_width(3.0);
    draw_feature(&ctx, &projection, &request.boundary, false, true)?;

    if let Some(user_features) = request.user_features.as_ref().filter(|f| !f.is_empty()) {
        ctx.set_fill_style(&JsValue::from_str("#1f77b4"));
        ctx.set_stroke_style(&JsValue::from_str("#1f77b4"));
        ctx.set_line_width(2.0);
        for feature in user_features {
            draw_feature(&ctx, &projection, feature, true, true)?;
        }
    }

    draw_labels(
        &ctx,
        width,
        height,
        request.title.as_deref(),
        request.attribution.as_deref(),
    )
}

/// Data-URL export of the rendered canvas. PNG is lossless; JPEG uses a
/// fixed 0.9 quality.
pub fn export_image(canvas: &HtmlCanvasElement, format: &str) -> Result<String, JsValue> {
    match format {
        "png" => canvas.to_data_url_with_type("image/png"),
        "jpeg" => canvas.to_data_url_with_type_and_encoder_options(
            "image/jpeg",
            &JsValue::from_f64(JPEG_QUALITY),
        ),
        other => Err(JsValue::from_str(&format!(
            "Unsupported export format: {} (expected png or jpeg)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes_match_300_dpi_print_dimensions() {
        assert_eq!(PageSize::A3.pixel_dimensions(), (3508, 4961));
        assert_eq!(PageSize::A4.pixel_dimensions(), (2480, 3508));
        assert_eq!(PageSize::A5.pixel_dimensions(), (1748, 2480));
    }

    #[test]
    fn page_sizes_parse_from_lowercase_names() {
        let size: PageSize = serde_json::from_str("\"a4\"").unwrap();
        assert_eq!(size, PageSize::A4);
        assert!(serde_json::from_str::<PageSize>("\"letter\"").is_err());
    }

    #[test]
    fn fit_centers_bounds_in_the_target_rect() {
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 100.0,
            min_y: 0.0,
            max_y: 100.0,
        };
        let projection = Projection::fit(&bounds, 200.0, 400.0);
        assert_eq!(projection.scale, 2.0);

        // Corners land centered: x spans the full width, y is vertically
        // centered with north at the top.
        assert_eq!(projection.apply(0.0, 100.0), (0.0, 100.0));
        assert_eq!(projection.apply(100.0, 0.0), (200.0, 300.0));
    }

    #[test]
    fn fit_reflects_y() {
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
        };
        let projection = Projection::fit(&bounds, 10.0, 10.0);
        let (_, top) = projection.apply(0.0, 10.0);
        let (_, bottom) = projection.apply(0.0, 0.0);
        assert!(top < bottom);
    }

    #[test]
    fn translate_offsets_the_fit() {
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
        };
        let mut projection = Projection::fit(&bounds, 10.0, 10.0);
        let before = projection.apply(5.0, 5.0);
        projection.translate(3.0, 7.0);
        let after = projection.apply(5.0, 5.0);
        assert_eq!(after.0, before.0 + 3.0);
        assert_eq!(after.1, before.1 + 7.0);
    }

    #[test]
    fn framed_projection_insets_the_boundary() {
        let boundary = serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [0.0, 0.0],
                    [100_000.0, 0.0],
                    [100_000.0, 100_000.0],
                    [0.0, 100_000.0],
                    [0.0, 0.0],
                ]],
            },
        });

        let projection = framed_projection(&boundary, 1000.0, 1000.0);

        // Frame is the boundary inset by 33km on each side: 33000..67000.
        // Fitted into 850x750, the tighter axis is vertical.
        let expected_scale = 750.0 / 34_000.0;
        assert!((projection.scale - expected_scale).abs() < 1e-9);

        // The frame center maps to the map-area center plus the offsets.
        let (cx, cy) = projection.apply(50_000.0, 50_000.0);
        assert!((cx - (425.0 + 75.0)).abs() < 1e-9);
        assert!((cy - (375.0 + 150.0)).abs() < 1e-9);
    }
}
