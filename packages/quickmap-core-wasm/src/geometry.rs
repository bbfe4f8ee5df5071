use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Axis-aligned extent of a feature's coordinates. Starts at the infinity
/// sentinel; a feature with no geometry leaves it non-finite, which callers
/// must treat as "no geometry" rather than an error.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn sentinel() -> Bounds {
        Bounds {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// True once at least one coordinate pair has been folded in.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
    }

    fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }
}

/// One level of a GeoJSON coordinates tree. Nesting depth varies by geometry
/// type (point pair, line/ring, polygon, multipolygon), so nodes are
/// classified by whether the first element is itself a sequence.
enum CoordNode<'a> {
    Pair(f64, f64),
    Nested(&'a [Value]),
    Empty,
}

fn classify(coords: &Value) -> CoordNode<'_> {
    let Some(items) = coords.as_array() else {
        return CoordNode::Empty;
    };
    match items.first() {
        Some(first) if first.is_array() => CoordNode::Nested(items),
        Some(_) => {
            let x = items.first().and_then(Value::as_f64);
            let y = items.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => CoordNode::Pair(x, y),
                _ => CoordNode::Empty,
            }
        }
        None => CoordNode::Empty,
    }
}

fn fold_coordinates(coords: &Value, bounds: &mut Bounds) {
    match classify(coords) {
        CoordNode::Pair(x, y) => bounds.extend(x, y),
        CoordNode::Nested(items) => {
            for item in items {
                fold_coordinates(item, bounds);
            }
        }
        CoordNode::Empty => {}
    }
}

/// Calculates the geographic bounds of a GeoJSON feature by walking its
/// coordinate nesting. Missing geometry or coordinates yields the sentinel.
pub fn calculate_bounds(feature: &Value) -> Bounds {
    let mut bounds = Bounds::sentinel();
    if let Some(coords) = feature.get("geometry").and_then(|g| g.get("coordinates")) {
        fold_coordinates(coords, &mut bounds);
    }
    bounds
}

/// Builds a closed bounding-box Polygon from bounds plus a signed buffer.
/// Positive buffers expand outward, negative ones inset; a negative buffer
/// large enough to invert the rectangle is the caller's problem.
pub fn create_bounding_box(bounds: &Bounds, buffer: f64) -> Value {
    let min_x = bounds.min_x - buffer;
    let max_x = bounds.max_x + buffer;
    let min_y = bounds.min_y - buffer;
    let max_y = bounds.max_y + buffer;

    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ]],
    })
}
