use image::GenericImageView;
use serde_json::{json, Value};

use super::{ModelCall, VisionModel};
use crate::error::{SketchError, SketchResult};

/// Offline back end with deterministic replies.
///
/// The reply is one fenced JSON object that satisfies both the element
/// schema and the project schema, derived from the sketch's ink bounding
/// box. Undecodable images fail like a rejected upstream call would.
pub struct DryrunVisionModel;

const INK_LUMA_THRESHOLD: u8 = 200;

impl VisionModel for DryrunVisionModel {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn request(&self, call: &ModelCall<'_>) -> SketchResult<String> {
        let image = image::load_from_memory(call.image).map_err(|err| {
            SketchError::Upstream(format!("dryrun could not decode sketch image: {err}"))
        })?;
        let (width, height) = image.dimensions();
        let luma = image.to_luma8();

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in luma.enumerate_pixels() {
            if pixel[0] >= INK_LUMA_THRESHOLD {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        let (x0, y0, x1, y1) = bounds.unwrap_or((0, 0, width.saturating_sub(1), height.saturating_sub(1)));
        let scale_x = 1000.0 / f64::from(width.max(1));
        let scale_y = 1000.0 / f64::from(height.max(1));

        let payload = json!({
            "elements": [
                {
                    "type": "rectangle",
                    "left": (f64::from(x0) * scale_x).round(),
                    "top": (f64::from(y0) * scale_y).round(),
                    "width": (f64::from(x1 - x0 + 1) * scale_x).round(),
                    "height": (f64::from(y1 - y0 + 1) * scale_y).round(),
                    "fill": "transparent",
                    "stroke": "#333333",
                },
                {
                    "type": "text",
                    "left": (f64::from(x0) * scale_x).round(),
                    "top": ((f64::from(y1) * scale_y) + 20.0).round().min(960.0),
                    "text": format!("{width}x{height} sketch"),
                    "fill": "#333333",
                    "fontFamily": "Helvetica",
                    "fontSize": 24,
                },
            ],
            "projectStructure": {
                "description": format!("Single view generated offline from a {width}x{height} sketch."),
            },
            "components": {
                "app-sketch-view": sketch_view_component(width, height),
            },
            "services": {
                "sketch-data": SKETCH_SERVICE,
            },
            "models": {
                "sketch": SKETCH_MODEL,
            },
        });
        let body = serde_json::to_string_pretty(&payload)
            .map_err(|err| SketchError::Upstream(format!("dryrun serialization failed: {err}")))?;
        Ok(format!(
            "Interpretation of the sketch:\n\n```json\n{body}\n```\n"
        ))
    }
}

fn sketch_view_component(width: u32, height: u32) -> Value {
    json!({
        "ts": "import { Component } from '@angular/core';\n\n@Component({\n  selector: 'app-sketch-view',\n  templateUrl: './app-sketch-view.component.html',\n  styleUrls: ['./app-sketch-view.component.css']\n})\nexport class AppSketchViewComponent {\n  caption = 'Sketch preview';\n}\n",
        "html": format!("<section class=\"sketch-view\">\n  <h2>{{{{ caption }}}}</h2>\n  <div class=\"sketch-frame\" style=\"aspect-ratio: {width} / {height}\"></div>\n</section>\n"),
        "scss": ".sketch-view {\n  padding: 1rem;\n}\n\n.sketch-frame {\n  border: 2px dashed #333;\n}\n",
    })
}

const SKETCH_SERVICE: &str = "import { Injectable } from '@angular/core';\nimport { HttpClient } from '@angular/common/http';\nimport { Observable } from 'rxjs';\nimport { Sketch } from '../models/sketch.model';\n\n@Injectable({ providedIn: 'root' })\nexport class SketchDataService {\n  private readonly baseUrl = '/api/sketches';\n\n  constructor(private http: HttpClient) {}\n\n  list(): Observable<Sketch[]> {\n    return this.http.get<Sketch[]>(this.baseUrl);\n  }\n}\n";

const SKETCH_MODEL: &str = "export interface Sketch {\n  id: string;\n  title: string;\n}\n";

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    fn png_with_ink() -> Vec<u8> {
        let mut image = RgbImage::from_pixel(100, 50, Rgb([255, 255, 255]));
        for x in 20..60 {
            for y in 10..30 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn reply_is_fenced_json_scaled_to_canvas_units() -> anyhow::Result<()> {
        let bytes = png_with_ink();
        let call = ModelCall {
            prompt: "any",
            image: &bytes,
            temperature: 0.0,
            max_tokens: 100,
        };
        let reply = DryrunVisionModel.request(&call)?;
        assert!(reply.contains("```json"));
        let start = reply.find('{').unwrap_or(0);
        let end = reply.rfind('}').unwrap_or(0);
        let parsed: Value = serde_json::from_str(&reply[start..=end])?;
        let rect = &parsed["elements"][0];
        assert_eq!(rect["left"], 200.0);
        assert_eq!(rect["top"], 200.0);
        assert_eq!(rect["width"], 400.0);
        assert_eq!(rect["height"], 400.0);
        assert!(parsed["components"]["app-sketch-view"]["ts"].is_string());
        Ok(())
    }

    #[test]
    fn corrupted_image_is_an_upstream_error() {
        let call = ModelCall {
            prompt: "any",
            image: b"\x89PNG not really",
            temperature: 0.0,
            max_tokens: 100,
        };
        assert!(matches!(
            DryrunVisionModel.request(&call),
            Err(SketchError::Upstream(_))
        ));
    }
}
