//! Drawable shape elements on the fixed 1000×1000 logical canvas.
//!
//! The serialized form uses Fabric.js field names (`objectId`, `strokeWidth`,
//! `fontFamily`, ...) so a canvas front end can load the list as-is.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const CANVAS_UNITS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeElement {
    #[serde(default)]
    pub object_id: String,
    #[serde(flatten)]
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rectangle(BoxShape),
    Circle(CircleShape),
    Triangle(BoxShape),
    Line(LineShape),
    Text(TextShape),
    Path(PathShape),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoxShape {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CircleShape {
    pub left: f64,
    pub top: f64,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LineShape {
    /// `[x1, y1, x2, y2]`
    pub points: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextShape {
    pub left: f64,
    pub top: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PathShape {
    /// SVG path data.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Rectangle(_) => "rectangle",
            Shape::Circle(_) => "circle",
            Shape::Triangle(_) => "triangle",
            Shape::Line(_) => "line",
            Shape::Text(_) => "text",
            Shape::Path(_) => "path",
        }
    }
}

impl ShapeElement {
    pub fn new(shape: Shape) -> Self {
        Self {
            object_id: String::new(),
            shape,
        }
    }

    pub fn with_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = object_id.into();
        self
    }

    pub fn has_id(&self) -> bool {
        !self.object_id.trim().is_empty()
    }

    /// Lenient construction from a model-produced JSON object.
    ///
    /// Returns `None` for non-objects, unknown `type` values and shapes that
    /// carry no usable geometry (a path without data).
    pub fn from_model_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)?
            .trim()
            .to_ascii_lowercase();
        let shape = match kind.as_str() {
            "rectangle" | "rect" | "square" | "box" => Shape::Rectangle(box_shape(obj)),
            "triangle" => Shape::Triangle(box_shape(obj)),
            "circle" | "ellipse" | "oval" => Shape::Circle(circle_shape(obj)),
            "line" | "arrow" | "connector" => Shape::Line(line_shape(obj)?),
            "text" | "textbox" | "i-text" | "label" => Shape::Text(text_shape(obj)),
            "path" | "polyline" | "freehand" | "drawing" => Shape::Path(path_shape(obj)?),
            _ => return None,
        };
        let object_id = ["objectId", "object_id", "id"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(scalar_text))
            .unwrap_or_default();
        Some(Self { object_id, shape })
    }
}

/// The placeholder set returned when a sketch cannot be interpreted.
pub fn default_elements() -> Vec<ShapeElement> {
    vec![
        ShapeElement::new(Shape::Rectangle(BoxShape {
            left: 100.0,
            top: 100.0,
            width: 200.0,
            height: 100.0,
            fill: Some("#cccccc".to_string()),
            stroke: Some("#333333".to_string()),
            stroke_width: Some(2.0),
        }))
        .with_id(new_object_id()),
        ShapeElement::new(Shape::Circle(CircleShape {
            left: 400.0,
            top: 300.0,
            radius: 50.0,
            fill: Some("#dddddd".to_string()),
            stroke: Some("#333333".to_string()),
            stroke_width: Some(2.0),
        }))
        .with_id(new_object_id()),
        ShapeElement::new(Shape::Text(TextShape {
            left: 100.0,
            top: 450.0,
            text: "Sketch could not be interpreted".to_string(),
            fill: Some("#333333".to_string()),
            font_family: Some("Helvetica".to_string()),
            font_size: Some(36.0),
            font_weight: Some("400".to_string()),
        }))
        .with_id(new_object_id()),
    ]
}

pub fn new_object_id() -> String {
    Uuid::new_v4().to_string()
}

/// Gives every element a non-empty id that is unique within the list.
///
/// Existing ids are kept; an id repeating an earlier one is replaced. Returns
/// the number of ids assigned.
pub fn assign_object_ids(elements: &mut [ShapeElement]) -> usize {
    let mut seen = HashSet::new();
    let mut assigned = 0;
    for element in elements.iter_mut() {
        if element.has_id() && seen.insert(element.object_id.clone()) {
            continue;
        }
        let mut fresh = new_object_id();
        while !seen.insert(fresh.clone()) {
            fresh = new_object_id();
        }
        element.object_id = fresh;
        assigned += 1;
    }
    assigned
}

fn box_shape(obj: &Map<String, Value>) -> BoxShape {
    BoxShape {
        left: canvas_number(obj, &["left", "x"]).unwrap_or(0.0),
        top: canvas_number(obj, &["top", "y"]).unwrap_or(0.0),
        width: canvas_number(obj, &["width", "w"]).unwrap_or(0.0),
        height: canvas_number(obj, &["height", "h"]).unwrap_or(0.0),
        fill: color(obj, "fill"),
        stroke: color(obj, "stroke"),
        stroke_width: canvas_number(obj, &["strokeWidth", "stroke_width"]),
    }
}

fn circle_shape(obj: &Map<String, Value>) -> CircleShape {
    let radius = canvas_number(obj, &["radius", "r", "rx"]).unwrap_or_else(|| {
        let width = canvas_number(obj, &["width"]).unwrap_or(0.0);
        let height = canvas_number(obj, &["height"]).unwrap_or(0.0);
        width.max(height) / 2.0
    });
    CircleShape {
        left: canvas_number(obj, &["left", "x"]).unwrap_or(0.0),
        top: canvas_number(obj, &["top", "y"]).unwrap_or(0.0),
        radius,
        fill: color(obj, "fill"),
        stroke: color(obj, "stroke"),
        stroke_width: canvas_number(obj, &["strokeWidth", "stroke_width"]),
    }
}

fn line_shape(obj: &Map<String, Value>) -> Option<LineShape> {
    let points = match obj.get("points") {
        Some(Value::Array(items)) => line_points(items),
        _ => None,
    }
    .or_else(|| {
        Some([
            number(obj, &["x1"])?,
            number(obj, &["y1"])?,
            number(obj, &["x2"])?,
            number(obj, &["y2"])?,
        ])
    })?;
    Some(LineShape {
        points: points.map(on_canvas),
        stroke: color(obj, "stroke").or_else(|| color(obj, "fill")),
        stroke_width: canvas_number(obj, &["strokeWidth", "stroke_width"]),
    })
}

fn line_points(items: &[Value]) -> Option<[f64; 4]> {
    // [{x, y}, {x, y}]
    if items.len() == 2 && items.iter().all(Value::is_object) {
        let coord = |value: &Value, key: &str| value.get(key).and_then(as_number);
        return Some([
            coord(&items[0], "x")?,
            coord(&items[0], "y")?,
            coord(&items[1], "x")?,
            coord(&items[1], "y")?,
        ]);
    }
    // [x1, y1, x2, y2] or [[x1], [y1], [x2], [y2]] or [[x1, y1], [x2, y2]]
    let flat: Vec<f64> = items
        .iter()
        .flat_map(|item| match item {
            Value::Array(inner) => inner.iter().filter_map(as_number).collect::<Vec<f64>>(),
            other => as_number(other).into_iter().collect(),
        })
        .collect();
    if flat.len() < 4 {
        return None;
    }
    Some([flat[0], flat[1], flat[2], flat[3]])
}

fn text_shape(obj: &Map<String, Value>) -> TextShape {
    TextShape {
        left: canvas_number(obj, &["left", "x"]).unwrap_or(0.0),
        top: canvas_number(obj, &["top", "y"]).unwrap_or(0.0),
        text: ["text", "content", "label"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(scalar_text))
            .unwrap_or_default(),
        fill: color(obj, "fill").or_else(|| color(obj, "color")),
        font_family: obj
            .get("fontFamily")
            .and_then(scalar_text)
            .filter(|value| !value.is_empty()),
        font_size: canvas_number(obj, &["fontSize", "font_size"]),
        font_weight: obj.get("fontWeight").and_then(scalar_text),
    }
}

fn path_shape(obj: &Map<String, Value>) -> Option<PathShape> {
    let path = match obj.get("path").or_else(|| obj.get("d"))? {
        Value::String(data) => data.trim().to_string(),
        // Fabric serializes paths as [["M", 0, 0], ["L", 10, 10], ...]
        Value::Array(commands) => commands
            .iter()
            .filter_map(|command| {
                let parts = command.as_array()?;
                let tokens: Vec<String> = parts.iter().filter_map(scalar_text).collect();
                Some(tokens.join(" "))
            })
            .collect::<Vec<String>>()
            .join(" "),
        _ => return None,
    };
    if path.is_empty() {
        return None;
    }
    Some(PathShape {
        path,
        fill: color(obj, "fill"),
        stroke: color(obj, "stroke"),
        stroke_width: canvas_number(obj, &["strokeWidth", "stroke_width"]),
    })
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| obj.get(*key).and_then(as_number))
}

/// Geometry never leaves the logical canvas.
fn canvas_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    number(obj, keys).map(on_canvas)
}

fn on_canvas(value: f64) -> f64 {
    value.clamp(0.0, CANVAS_UNITS)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches("px").parse::<f64>().ok(),
        Value::Array(items) if items.len() == 1 => as_number(&items[0]),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn color(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
