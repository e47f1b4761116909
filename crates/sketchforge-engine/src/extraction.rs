//! Sketch → shape elements with bounded, escalating retries.
//!
//! The controller is an explicit state machine:
//!
//! ```text
//! Attempting(0) ─fail─▶ Attempting(1) ─fail─▶ Attempting(2) ─fail─▶ ExhaustedFallback
//!       │                     │                     │
//!       └──────── non-empty element list ───────────┴──────▶ Succeeded
//! ```
//!
//! Every failure class (transport, refusal, undecodable, empty) advances the
//! machine the same way. Exhaustion yields [`default_elements`], so callers
//! always receive a usable list.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sketchforge_contracts::elements::{assign_object_ids, default_elements};
use sketchforge_contracts::{EventWriter, ShapeElement};

use crate::client::{ModelCall, VisionModel};
use crate::config::EngineConfig;
use crate::decoder;
use crate::error::{SketchError, SketchResult};
use crate::journal;
use crate::prompts::{DETAILED_ELEMENTS_PROMPT, MINIMAL_ELEMENTS_PROMPT, SIMPLIFIED_ELEMENTS_PROMPT};

pub const MAX_ATTEMPTS: usize = 3;
pub const TEMPERATURE_STEP: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    Detailed,
    Simplified,
    /// Best effort; explicitly allows an empty element list.
    Minimal,
}

impl PromptVariant {
    /// First attempt is detailed, the last one is always minimal.
    pub fn for_attempt(index: usize, max_attempts: usize) -> Self {
        if index + 1 >= max_attempts {
            Self::Minimal
        } else if index == 0 {
            Self::Detailed
        } else {
            Self::Simplified
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Detailed => DETAILED_ELEMENTS_PROMPT,
            Self::Simplified => SIMPLIFIED_ELEMENTS_PROMPT,
            Self::Minimal => MINIMAL_ELEMENTS_PROMPT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detailed => "detailed",
            Self::Simplified => "simplified",
            Self::Minimal => "minimal",
        }
    }
}

pub fn temperature_for_attempt(index: usize) -> f64 {
    index as f64 * TEMPERATURE_STEP
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Success,
    Refused,
    ParseError,
    Empty,
    UpstreamError,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Refused => "refused",
            Self::ParseError => "parse-error",
            Self::Empty => "empty",
            Self::UpstreamError => "upstream-error",
        }
    }

    fn from_error(err: &SketchError) -> Self {
        match err {
            SketchError::Refusal(_) => Self::Refused,
            SketchError::Decode(_) => Self::ParseError,
            SketchError::EmptyResult => Self::Empty,
            _ => Self::UpstreamError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionAttempt {
    pub index: usize,
    pub variant: PromptVariant,
    pub temperature: f64,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionState {
    Attempting(usize),
    Succeeded(Vec<ShapeElement>),
    ExhaustedFallback,
}

impl ExtractionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Attempting(_))
    }
}

/// The transition function. `result` is the classified reply of attempt
/// `index`; no network access is involved.
pub fn next_state(
    index: usize,
    max_attempts: usize,
    result: SketchResult<Vec<ShapeElement>>,
) -> ExtractionState {
    match result {
        Ok(mut elements) if !elements.is_empty() => {
            assign_object_ids(&mut elements);
            ExtractionState::Succeeded(elements)
        }
        _ if index + 1 < max_attempts => ExtractionState::Attempting(index + 1),
        _ => ExtractionState::ExhaustedFallback,
    }
}

/// Classifies one raw reply: refusal scan, decode, normalize.
pub fn interpret_reply(raw: &str) -> SketchResult<Vec<ShapeElement>> {
    if let Some(phrase) = detect_refusal(raw) {
        return Err(SketchError::Refusal(phrase));
    }
    let object = decoder::decode(raw)?;
    let elements = normalize_elements(&object);
    if elements.is_empty() {
        return Err(SketchError::EmptyResult);
    }
    Ok(elements)
}

fn refusal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:cannot|can[’']?t|unable to|not able to|i'?m sorry|sorry|i apologi[sz]e|no puedo|no es posible|no me es posible|lo siento|incapaz|disculpa)\b",
        )
        .expect("refusal pattern")
    })
}

/// Returns the matched refusal phrase, looking only at the prose that
/// precedes the first `{` so that strings inside the JSON cannot trigger it.
pub fn detect_refusal(raw: &str) -> Option<String> {
    let prose = match raw.find('{') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    refusal_pattern()
        .find(prose)
        .map(|found| found.as_str().to_string())
}

/// `elements`, else `shapes` / `objects`, else any top-level value that
/// carries a `type` (objects, or arrays of objects).
pub fn normalize_elements(object: &Map<String, Value>) -> Vec<ShapeElement> {
    for key in ["elements", "shapes", "objects"] {
        if let Some(Value::Array(items)) = object.get(key) {
            return items.iter().filter_map(ShapeElement::from_model_value).collect();
        }
    }
    if object.contains_key("type") {
        return ShapeElement::from_model_value(&Value::Object(object.clone()))
            .into_iter()
            .collect();
    }

    let mut elements = Vec::new();
    for value in object.values() {
        match value {
            Value::Object(inner) if inner.contains_key("type") => {
                elements.extend(ShapeElement::from_model_value(value));
            }
            Value::Array(items) => {
                elements.extend(items.iter().filter_map(ShapeElement::from_model_value));
            }
            _ => {}
        }
    }
    elements
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub elements: Vec<ShapeElement>,
    pub attempts: Vec<ExtractionAttempt>,
    pub fell_back: bool,
}

pub struct ExtractionController {
    model: Arc<dyn VisionModel>,
    max_tokens: u64,
    max_attempts: usize,
    events: EventWriter,
}

impl ExtractionController {
    pub fn new(model: Arc<dyn VisionModel>, config: &EngineConfig, events: EventWriter) -> Self {
        Self {
            model,
            max_tokens: config.max_tokens,
            max_attempts: MAX_ATTEMPTS,
            events,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Never fails; degrades to the placeholder set.
    pub fn extract(&self, image: &[u8]) -> Extraction {
        let mut attempts = Vec::new();
        let mut state = ExtractionState::Attempting(0);

        while let ExtractionState::Attempting(index) = state {
            let variant = PromptVariant::for_attempt(index, self.max_attempts);
            let temperature = temperature_for_attempt(index);
            let call = ModelCall {
                prompt: variant.prompt(),
                image,
                temperature,
                max_tokens: self.max_tokens,
            };
            let result = self
                .model
                .request(&call)
                .and_then(|raw| interpret_reply(&raw));

            let attempt = ExtractionAttempt {
                index,
                variant,
                temperature,
                outcome: match &result {
                    Ok(_) => AttemptOutcome::Success,
                    Err(err) => AttemptOutcome::from_error(err),
                },
                detail: result.as_ref().err().map(ToString::to_string),
            };
            if let Some(detail) = &attempt.detail {
                tracing::debug!(attempt = index, variant = variant.as_str(), %detail, "extraction attempt failed");
            }
            journal(
                &self.events,
                "extraction_attempt",
                json!({
                    "attempt": index,
                    "variant": variant.as_str(),
                    "temperature": temperature,
                    "outcome": attempt.outcome.as_str(),
                    "detail": attempt.detail,
                    "model": self.model.name(),
                }),
            );
            attempts.push(attempt);
            state = next_state(index, self.max_attempts, result);
        }

        match state {
            ExtractionState::Succeeded(elements) => {
                journal(
                    &self.events,
                    "extraction_succeeded",
                    json!({
                        "attempts": attempts.len(),
                        "elements": elements.len(),
                    }),
                );
                Extraction {
                    elements,
                    attempts,
                    fell_back: false,
                }
            }
            _ => {
                tracing::warn!(attempts = attempts.len(), "sketch could not be interpreted; using placeholder elements");
                let elements = default_elements();
                journal(
                    &self.events,
                    "extraction_fallback",
                    json!({
                        "attempts": attempts.len(),
                        "outcomes": attempts.iter().map(|a| a.outcome.as_str()).collect::<Vec<_>>(),
                    }),
                );
                Extraction {
                    elements,
                    attempts,
                    fell_back: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use sketchforge_contracts::elements::{BoxShape, Shape};

    use super::*;
    use crate::client::testing::ScriptedModel;

    fn controller(model: Arc<ScriptedModel>) -> ExtractionController {
        ExtractionController::new(model, &EngineConfig::default(), EventWriter::disabled("test"))
    }

    fn ids(elements: &[ShapeElement]) -> HashSet<String> {
        elements.iter().map(|e| e.object_id.clone()).collect()
    }

    #[test]
    fn variants_and_temperatures_escalate() {
        assert_eq!(PromptVariant::for_attempt(0, 3), PromptVariant::Detailed);
        assert_eq!(PromptVariant::for_attempt(1, 3), PromptVariant::Simplified);
        assert_eq!(PromptVariant::for_attempt(2, 3), PromptVariant::Minimal);
        assert_eq!(PromptVariant::for_attempt(0, 1), PromptVariant::Minimal);
        assert_eq!(temperature_for_attempt(0), 0.0);
        assert!((temperature_for_attempt(2) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn transition_function_without_network() {
        let rect = ShapeElement::new(Shape::Rectangle(BoxShape::default()));
        assert_eq!(
            next_state(0, 3, Err(SketchError::EmptyResult)),
            ExtractionState::Attempting(1)
        );
        assert_eq!(
            next_state(2, 3, Err(SketchError::Refusal("sorry".into()))),
            ExtractionState::ExhaustedFallback
        );
        assert_eq!(next_state(2, 3, Ok(Vec::new())), ExtractionState::ExhaustedFallback);
        match next_state(1, 3, Ok(vec![rect])) {
            ExtractionState::Succeeded(elements) => assert!(elements[0].has_id()),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn refusal_scan_ignores_text_inside_json() {
        assert!(detect_refusal("I'm sorry, but I cannot help with that.").is_some());
        assert!(detect_refusal("Lo siento, no puedo analizar esta imagen").is_some());
        assert!(detect_refusal("UNABLE TO process").is_some());
        assert!(detect_refusal("Here you go: {\"text\": \"Sorry, closed\"}").is_none());
    }

    #[test]
    fn all_refusals_yield_default_set_with_unique_ids() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("I'm sorry, I can't interpret this image.".to_string()),
            Ok("Lo siento, no puedo ayudar con eso.".to_string()),
            Ok("Unable to comply.".to_string()),
        ]));
        let extraction = controller(model.clone()).extract(b"img");

        assert!(extraction.fell_back);
        assert_eq!(extraction.elements.len(), 3);
        let kinds: Vec<&str> = extraction.elements.iter().map(|e| e.shape.kind()).collect();
        assert_eq!(kinds, vec!["rectangle", "circle", "text"]);
        assert_eq!(ids(&extraction.elements).len(), 3);
        assert!(extraction
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Refused));
        assert_eq!(model.temperatures().len(), 3);
    }

    #[test]
    fn missing_ids_are_assigned_and_existing_ids_kept() {
        let reply = r#"```json
{"elements": [
  {"type": "rectangle", "left": 1, "top": 2, "width": 3, "height": 4, "objectId": "keep-me"},
  {"type": "circle", "left": 10, "top": 10, "radius": 5},
  {"type": "text", "left": 0, "top": 0, "text": "Hi"}
]}
```"#;
        let model = Arc::new(ScriptedModel::replying(reply));
        let extraction = controller(model).extract(b"img");

        assert!(!extraction.fell_back);
        assert_eq!(extraction.elements[0].object_id, "keep-me");
        assert!(extraction.elements.iter().all(ShapeElement::has_id));
        assert_eq!(ids(&extraction.elements).len(), 3);
    }

    #[test]
    fn errors_and_empty_lists_escalate_until_success() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(SketchError::Upstream("503".to_string())),
            Ok("{\"elements\": []}".to_string()),
            Ok("{\"shapes\": [{\"type\": \"line\", \"points\": [0, 0, 10, 10]}]}".to_string()),
        ]));
        let extraction = controller(model.clone()).extract(b"img");

        assert!(!extraction.fell_back);
        assert_eq!(extraction.elements.len(), 1);
        let outcomes: Vec<AttemptOutcome> = extraction.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::UpstreamError,
                AttemptOutcome::Empty,
                AttemptOutcome::Success
            ]
        );
        assert_eq!(model.temperatures(), vec![0.0, 0.2, 0.4]);
        let prompts = model.prompts();
        assert_eq!(prompts[0], DETAILED_ELEMENTS_PROMPT);
        assert_eq!(prompts[2], MINIMAL_ELEMENTS_PROMPT);
    }

    #[test]
    fn normalization_accepts_typed_top_level_values() -> anyhow::Result<()> {
        let object = decoder::decode(
            r#"{"header": {"type": "rect", "left": 0, "top": 0, "width": 1000, "height": 80},
                "labels": [{"type": "text", "text": "Title"}, {"type": "unknown"}],
                "note": "ignored"}"#,
        )?;
        let elements = normalize_elements(&object);
        let kinds: Vec<&str> = elements.iter().map(|e| e.shape.kind()).collect();
        assert_eq!(kinds, vec!["rectangle", "text"]);
        Ok(())
    }

    #[test]
    fn journal_records_each_attempt() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let model = Arc::new(ScriptedModel::new(vec![Ok("nothing here".to_string())]));
        let controller = ExtractionController::new(
            model,
            &EngineConfig::default(),
            EventWriter::new(&path, "run-x"),
        )
        .with_max_attempts(2);
        let extraction = controller.extract(b"img");
        assert!(extraction.fell_back);

        let lines: Vec<Value> = std::fs::read_to_string(&path)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        let types: Vec<&str> = lines.iter().filter_map(|e| e["type"].as_str()).collect();
        assert_eq!(
            types,
            vec!["extraction_attempt", "extraction_attempt", "extraction_fallback"]
        );
        assert_eq!(lines[0]["outcome"], "parse-error");
        assert_eq!(lines[1]["outcome"], "upstream-error");
        Ok(())
    }
}
