//! Raster preview of an element list.
//!
//! The 1000-unit logical canvas is drawn at half scale onto a white image.
//! Text is approximated by a bar on its baseline; path curves are drawn as
//! straight segments between command endpoints.

use std::path::Path;
use std::sync::OnceLock;

use image::{ImageFormat, Rgb, RgbImage};
use regex::Regex;
use sketchforge_contracts::elements::{
    BoxShape, CircleShape, LineShape, PathShape, TextShape, CANVAS_UNITS,
};
use sketchforge_contracts::{Shape, ShapeElement};

use crate::error::{SketchError, SketchResult};

pub const PREVIEW_SIZE: u32 = 500;

const SCALE: f64 = PREVIEW_SIZE as f64 / CANVAS_UNITS;
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const DEFAULT_FONT_SIZE: f64 = 20.0;
const MAX_STROKE_PX: f64 = 32.0;

pub fn render_preview(elements: &[ShapeElement]) -> RgbImage {
    let mut canvas = Canvas::new();
    for element in elements {
        match &element.shape {
            Shape::Rectangle(rect) => canvas.rectangle(rect),
            Shape::Circle(circle) => canvas.circle(circle),
            Shape::Triangle(tri) => canvas.triangle(tri),
            Shape::Line(line) => canvas.line_shape(line),
            Shape::Text(text) => canvas.text(text),
            Shape::Path(path) => canvas.path(path),
        }
    }
    canvas.image
}

pub fn write_preview(elements: &[ShapeElement], path: &Path) -> SketchResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| SketchError::fs(parent, err))?;
    }
    render_preview(elements)
        .save_with_format(path, ImageFormat::Png)
        .map_err(|err| SketchError::fs(path, std::io::Error::other(err)))
}

/// `#rgb`, `#rrggbb`, `rgb(r, g, b)` and a few names. `None` for
/// `transparent`/`none` and anything unrecognized.
pub fn parse_color(raw: &str) -> Option<Rgb<u8>> {
    static RGB_FN: OnceLock<Regex> = OnceLock::new();
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex_digits) = value.strip_prefix('#') {
        let expanded: String = match hex_digits.len() {
            3 => hex_digits.chars().flat_map(|ch| [ch, ch]).collect(),
            6 => hex_digits.to_string(),
            _ => return None,
        };
        let bytes = hex::decode(expanded).ok()?;
        return Some(Rgb([bytes[0], bytes[1], bytes[2]]));
    }
    let pattern = RGB_FN.get_or_init(|| {
        Regex::new(r"^rgba?\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)").expect("rgb pattern")
    });
    if let Some(captures) = pattern.captures(&value) {
        let channel = |idx: usize| -> u8 {
            captures
                .get(idx)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .map_or(0, |v| v.min(255) as u8)
        };
        return Some(Rgb([channel(1), channel(2), channel(3)]));
    }
    match value.as_str() {
        "black" => Some(BLACK),
        "white" => Some(WHITE),
        "red" => Some(Rgb([255, 0, 0])),
        "green" => Some(Rgb([0, 128, 0])),
        "blue" => Some(Rgb([0, 0, 255])),
        "gray" | "grey" => Some(Rgb([128, 128, 128])),
        "yellow" => Some(Rgb([255, 255, 0])),
        "orange" => Some(Rgb([255, 165, 0])),
        _ => None,
    }
}

fn color(raw: Option<&String>) -> Option<Rgb<u8>> {
    raw.and_then(|value| parse_color(value))
}

fn stroke_px(width: Option<f64>) -> f64 {
    let px = width.unwrap_or(1.0) * SCALE;
    if px.is_finite() {
        px.clamp(1.0, MAX_STROKE_PX)
    } else {
        1.0
    }
}

/// Pixel rows or columns covered by `a..b`, clipped to the image. At least
/// one pixel wide when it overlaps at all; `None` for non-finite bounds.
fn pixel_span(a: f64, b: f64) -> Option<(u32, u32)> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let size = f64::from(PREVIEW_SIZE);
    let start = a.min(b).round();
    let end = a.max(b).round().max(start + 1.0);
    if end <= 0.0 || start >= size {
        return None;
    }
    Some((start.max(0.0) as u32, end.min(size) as u32))
}

/// Liang-Barsky clip of a segment against the image grown by `margin`.
fn clip_segment(from: Point, to: Point, margin: f64) -> Option<(Point, Point)> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    if !(from.0.is_finite() && from.1.is_finite() && dx.is_finite() && dy.is_finite()) {
        return None;
    }
    let (low, high) = (-margin, f64::from(PREVIEW_SIZE) + margin);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, from.0 - low),
        (dx, high - from.0),
        (-dy, from.1 - low),
        (dy, high - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        (from.0 + dx * t0, from.1 + dy * t0),
        (from.0 + dx * t1, from.1 + dy * t1),
    ))
}

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new() -> Self {
        Self {
            image: RgbImage::from_pixel(PREVIEW_SIZE, PREVIEW_SIZE, WHITE),
        }
    }

    fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgb<u8>) {
        let (Some((left, right)), Some((top, bottom))) = (pixel_span(x0, x1), pixel_span(y0, y1))
        else {
            return;
        };
        for y in top..bottom {
            for x in left..right {
                self.image.put_pixel(x, y, color);
            }
        }
    }

    fn segment(&mut self, from: Point, to: Point, width: f64, color: Rgb<u8>) {
        let half = width / 2.0;
        let Some((from, to)) = clip_segment(from, to, half + 1.0) else {
            return;
        };
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let (x, y) = (from.0 + dx * t, from.1 + dy * t);
            self.fill_rect(x - half, y - half, x + half, y + half, color);
        }
    }

    fn polygon_outline(&mut self, points: &[Point], width: f64, color: Rgb<u8>) {
        for (idx, from) in points.iter().enumerate() {
            let to = points[(idx + 1) % points.len()];
            self.segment(*from, to, width, color);
        }
    }

    fn rectangle(&mut self, rect: &BoxShape) {
        let (x0, y0) = (rect.left * SCALE, rect.top * SCALE);
        let (x1, y1) = (x0 + rect.width * SCALE, y0 + rect.height * SCALE);
        let fill = color(rect.fill.as_ref());
        if let Some(fill) = fill {
            self.fill_rect(x0, y0, x1, y1, fill);
        }
        let stroke = color(rect.stroke.as_ref()).or(if fill.is_none() { Some(BLACK) } else { None });
        if let Some(stroke) = stroke {
            let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
            self.polygon_outline(&corners, stroke_px(rect.stroke_width), stroke);
        }
    }

    fn circle(&mut self, circle: &CircleShape) {
        let radius = circle.radius * SCALE;
        let (cx, cy) = (circle.left * SCALE + radius, circle.top * SCALE + radius);
        let fill = color(circle.fill.as_ref());
        let stroke = color(circle.stroke.as_ref()).or(if fill.is_none() { Some(BLACK) } else { None });
        let ring = stroke_px(circle.stroke_width);
        let reach = radius.abs() + ring;
        let (Some((left, right)), Some((top, bottom))) =
            (pixel_span(cx - reach, cx + reach), pixel_span(cy - reach, cy + reach))
        else {
            return;
        };
        for y in top..bottom {
            for x in left..right {
                let distance =
                    ((f64::from(x) + 0.5 - cx).powi(2) + (f64::from(y) + 0.5 - cy).powi(2)).sqrt();
                if let Some(stroke) = stroke {
                    if (distance - radius).abs() <= ring / 2.0 {
                        self.image.put_pixel(x, y, stroke);
                        continue;
                    }
                }
                if let Some(fill) = fill {
                    if distance < radius {
                        self.image.put_pixel(x, y, fill);
                    }
                }
            }
        }
    }

    fn triangle(&mut self, tri: &BoxShape) {
        let (x0, y0) = (tri.left * SCALE, tri.top * SCALE);
        let (w, h) = (tri.width * SCALE, tri.height * SCALE);
        let points = [(x0 + w / 2.0, y0), (x0 + w, y0 + h), (x0, y0 + h)];
        let fill = color(tri.fill.as_ref());
        let span = pixel_span(x0, x0 + w).zip(pixel_span(y0, y0 + h));
        if let (Some(fill), Some(((left, right), (top, bottom)))) = (fill, span) {
            let edge = |a: Point, b: Point, p: Point| {
                (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
            };
            for y in top..bottom {
                for x in left..right {
                    let p = (f64::from(x) + 0.5, f64::from(y) + 0.5);
                    let signs = [
                        edge(points[0], points[1], p),
                        edge(points[1], points[2], p),
                        edge(points[2], points[0], p),
                    ];
                    if signs.iter().all(|s| *s >= 0.0) || signs.iter().all(|s| *s <= 0.0) {
                        self.image.put_pixel(x, y, fill);
                    }
                }
            }
        }
        let stroke = color(tri.stroke.as_ref()).or(if fill.is_none() { Some(BLACK) } else { None });
        if let Some(stroke) = stroke {
            self.polygon_outline(&points, stroke_px(tri.stroke_width), stroke);
        }
    }

    fn line_shape(&mut self, line: &LineShape) {
        let [x1, y1, x2, y2] = line.points;
        let stroke = color(line.stroke.as_ref()).unwrap_or(BLACK);
        self.segment(
            (x1 * SCALE, y1 * SCALE),
            (x2 * SCALE, y2 * SCALE),
            stroke_px(line.stroke_width),
            stroke,
        );
    }

    fn text(&mut self, text: &TextShape) {
        let size = text.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        let chars = text.text.chars().count().max(1) as f64;
        let x0 = text.left * SCALE;
        let baseline = (text.top + size * 0.8) * SCALE;
        let width = chars * size * 0.6 * SCALE;
        let height = (size * 0.15 * SCALE).max(1.0);
        let fill = color(text.fill.as_ref()).unwrap_or(BLACK);
        self.fill_rect(x0, baseline, x0 + width, baseline + height, fill);
    }

    fn path(&mut self, path: &PathShape) {
        let stroke = color(path.stroke.as_ref())
            .or_else(|| color(path.fill.as_ref()))
            .unwrap_or(BLACK);
        let width = stroke_px(path.stroke_width);
        for (from, to) in path_segments(&path.path) {
            self.segment(
                (from.0 * SCALE, from.1 * SCALE),
                (to.0 * SCALE, to.1 * SCALE),
                width,
                stroke,
            );
        }
    }
}

type Point = (f64, f64);

/// Straight segments through the endpoints of `M/L/H/V/C/Q/Z` commands
/// (relative forms included). Unknown commands end the walk.
pub fn path_segments(data: &str) -> Vec<(Point, Point)> {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    let tokens = TOKENS.get_or_init(|| {
        Regex::new(r"[A-Za-z]|[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("path token pattern")
    });

    let mut segments = Vec::new();
    let mut current: Point = (0.0, 0.0);
    let mut start: Point = (0.0, 0.0);
    let mut command: Option<char> = None;
    let mut numbers: Vec<f64> = Vec::new();

    let mut flush = |command: char, args: &[f64], segments: &mut Vec<(Point, Point)>| -> bool {
        let relative = command.is_ascii_lowercase();
        let offset = |point: Point, current: Point| {
            if relative {
                (current.0 + point.0, current.1 + point.1)
            } else {
                point
            }
        };
        let arity = match command.to_ascii_uppercase() {
            'M' | 'L' => 2,
            'H' | 'V' => 1,
            'C' => 6,
            'Q' => 4,
            'Z' => 0,
            _ => return false,
        };
        if arity == 0 {
            if current != start {
                segments.push((current, start));
            }
            current = start;
            return true;
        }
        for (group, chunk) in args.chunks_exact(arity).enumerate() {
            let next = match command.to_ascii_uppercase() {
                'H' => {
                    let x = if relative { current.0 + chunk[0] } else { chunk[0] };
                    (x, current.1)
                }
                'V' => {
                    let y = if relative { current.1 + chunk[0] } else { chunk[0] };
                    (current.0, y)
                }
                _ => offset((chunk[arity - 2], chunk[arity - 1]), current),
            };
            if command.eq_ignore_ascii_case(&'M') && group == 0 {
                start = next;
            } else {
                segments.push((current, next));
            }
            current = next;
        }
        true
    };

    for token in tokens.find_iter(data) {
        let text = token.as_str();
        match text.chars().next() {
            Some(ch) if ch.is_ascii_alphabetic() => {
                if let Some(previous) = command {
                    if !flush(previous, &numbers, &mut segments) {
                        return segments;
                    }
                }
                command = Some(ch);
                numbers.clear();
            }
            _ => {
                if let Ok(value) = text.parse::<f64>() {
                    numbers.push(value);
                }
            }
        }
    }
    if let Some(previous) = command {
        flush(previous, &numbers, &mut segments);
    }
    segments
}
