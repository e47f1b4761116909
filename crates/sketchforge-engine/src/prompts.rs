//! Prompt texts sent to the vision model.

pub const DETAILED_ELEMENTS_PROMPT: &str = r#"Analyze this sketch image and extract every visual element as precise JSON objects.

TASK: Produce a JSON object with an array "elements" holding every detected object with exact coordinates and properties. Use a canvas of 1000x1000 units regardless of the image size.

STEPS:
1. Identify the main edges and outlines
2. Detect basic geometric figures
3. Recognize straight lines and connections
4. Look for text and typographic elements
5. Identify freehand drawings that need paths
6. Capture the spatial relations between elements
7. Use colors consistent with the tones observed in the image

IMPORTANT: if an element does not fit a basic geometric figure, represent it faithfully with "path".

Each object must follow this format according to its type:

1. RECTANGLE:
{"type": "rectangle", "left": <x>, "top": <y>, "width": <w>, "height": <h>, "fill": "<hex color>", "stroke": "<hex color>", "objectId": "<unique id>"}

2. CIRCLE:
{"type": "circle", "left": <x>, "top": <y>, "radius": <r>, "fill": "<hex color>", "stroke": "<hex color>", "objectId": "<unique id>"}

3. TRIANGLE:
{"type": "triangle", "left": <x>, "top": <y>, "width": <w>, "height": <h>, "fill": "<hex color>", "stroke": "<hex color>", "objectId": "<unique id>"}

4. LINE:
{"type": "line", "points": [<x1>, <y1>, <x2>, <y2>], "stroke": "<hex color>", "strokeWidth": 2, "objectId": "<unique id>"}

5. TEXT:
{"type": "text", "left": <x>, "top": <y>, "text": "<detected text>", "fill": "<hex color>", "fontFamily": "Helvetica", "fontSize": 36, "fontWeight": "400", "objectId": "<unique id>"}

6. PATH (freehand drawing):
{"type": "path", "path": "<SVG path data>", "fill": "<hex color>", "stroke": "<hex color>", "strokeWidth": <width>, "objectId": "<unique id>"}

Return ONLY the valid JSON, without explanations or markdown."#;

pub const SIMPLIFIED_ELEMENTS_PROMPT: &str = r##"Analyze this image of a sketch or diagram and convert it into JSON objects.

Produce a JSON object with an array "elements" holding the detected objects on a 1000x1000 canvas.

Identify:
- Rectangles: {"type": "rectangle", "left": X, "top": Y, "width": W, "height": H, "fill": "#color", "stroke": "#color"}
- Circles: {"type": "circle", "left": X, "top": Y, "radius": R, "fill": "#color", "stroke": "#color"}
- Triangles: {"type": "triangle", "left": X, "top": Y, "width": W, "height": H, "fill": "#color", "stroke": "#color"}
- Lines: {"type": "line", "points": [X1, Y1, X2, Y2], "stroke": "#color", "strokeWidth": 2}
- Text: {"type": "text", "left": X, "top": Y, "text": "text", "fill": "#color", "fontSize": 36}
- Paths: {"type": "path", "path": "SVG path data", "stroke": "#color"}

Include "objectId": "unique-id" on every element.

Answer with the JSON only."##;

pub const MINIMAL_ELEMENTS_PROMPT: &str = r##"Look at this image and build a JSON object with basic shapes.

Format:
{
  "elements": [
    {"type": "rectangle", "left": 100, "top": 100, "width": 200, "height": 100, "fill": "#cccccc", "objectId": "1"},
    {"type": "circle", "left": 400, "top": 300, "radius": 50, "fill": "#dddddd", "objectId": "2"},
    {"type": "line", "points": [500, 500, 700, 700], "stroke": "#000000", "objectId": "3"}
  ]
}

Only identify basic shapes. Coordinates use a 1000x1000 canvas. This is a best-effort pass: if nothing recognizable is present, answer {"elements": []} instead of declining."##;

const PROJECT_SCHEMA: &str = r#"{
  "projectStructure": {
    "description": "Description of the project structure and its main components"
  },
  "components": {
    "component-name": {
      "ts": "content of the .component.ts file",
      "html": "content of the .component.html file",
      "scss": "content of the style file"
    }
  },
  "services": {
    "service-name": "service source implementing the CRUD operations"
  },
  "models": {
    "model-name": "interface or class of the model"
  },
  "modules": {
    "module-name": "module source"
  },
  "routing": "route configuration of the project",
  "appShell": {
    "ts": "optional replacement for app.component.ts",
    "html": "optional replacement for app.component.html",
    "scss": "optional replacement for the app component styles"
  }
}"#;

/// Prompt for the full-project synthesis call.
pub fn project_synthesis_prompt(options_json: &str) -> String {
    format!(
        r#"Analyze this image of a diagram or visual mockup and generate a complete Angular project based on what you see.
Provide the code for the TypeScript components (.ts), HTML templates (.html) and styles.
Guidelines:

1. Interpret the image and identify every visual component (forms, tables, buttons, etc).
2. Generate every Angular component needed, with complete and working code.
3. Create an organized, modular project structure.
4. Write detailed styles so the result matches the image.
5. Identify the CRUD operations and generate services that consume a REST API.
6. Create interfaces and models for the data.
7. Use reactive forms for data entry, with validation and error handling.
8. Follow Angular best practices.
9. Generate navigation between views when several screens are detected.
10. Use kebab-case keys for every component, service, model and module name; component selectors must equal the component key.

Project options: {options_json}

Answer with one JSON object with this structure:

{PROJECT_SCHEMA}

Make sure the JSON is valid and every component carries all the code it needs. Omit "appShell" unless the root component itself must change."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_prompt_embeds_options_and_schema() {
        let prompt = project_synthesis_prompt(r#"{"name":"Shop"}"#);
        assert!(prompt.contains(r#"Project options: {"name":"Shop"}"#));
        assert!(prompt.contains("\"components\""));
        assert!(prompt.contains("\"routing\""));
        assert!(prompt.contains("\"appShell\""));
    }

    #[test]
    fn only_the_minimal_prompt_permits_an_empty_list() {
        assert!(MINIMAL_ELEMENTS_PROMPT.contains(r#"{"elements": []}"#));
        assert!(!DETAILED_ELEMENTS_PROMPT.contains(r#"{"elements": []}"#));
        assert!(!SIMPLIFIED_ELEMENTS_PROMPT.contains(r#"{"elements": []}"#));
    }
}
