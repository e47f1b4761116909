//! Recovers one JSON object from free-form model text.
//!
//! Candidate order: a fenced block tagged `json`, then any fenced block, then
//! the whole text. A candidate that does not open with `{` is sliced from its
//! first `{`. Only the first JSON value is parsed, so trailing prose after a
//! complete object is ignored.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{SketchError, SketchResult};

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```[ \t]*json[ \t]*\r?\n(.*?)```").expect("json fence pattern")
    })
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern")
    })
}

/// The text the decoder will try to parse, before `{` slicing.
pub fn candidate_payload(raw: &str) -> &str {
    if let Some(captures) = json_fence().captures(raw) {
        if let Some(body) = captures.get(1) {
            return body.as_str();
        }
    }
    if let Some(captures) = any_fence().captures(raw) {
        if let Some(body) = captures.get(1) {
            return body.as_str();
        }
    }
    raw
}

pub fn decode(raw: &str) -> SketchResult<Map<String, Value>> {
    let candidate = candidate_payload(raw);
    let trimmed = candidate.trim_start();
    let sliced = if trimmed.starts_with('{') {
        trimmed
    } else {
        let start = trimmed
            .find('{')
            .ok_or_else(|| SketchError::Decode("no JSON object in model output".to_string()))?;
        &trimmed[start..]
    };

    let mut stream = serde_json::Deserializer::from_str(sliced).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(err)) => return Err(SketchError::Decode(format!("invalid JSON: {err}"))),
        None => return Err(SketchError::Decode("empty JSON payload".to_string())),
    };
    match value {
        Value::Object(object) => Ok(object),
        other => Err(SketchError::Decode(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_fence_wins_over_surrounding_prose_and_other_fences() -> anyhow::Result<()> {
        let raw = "Sure! Here is a sketch summary.\n```text\nnot this {\"a\": 0}\n```\n\
                   and the data:\n```JSON\n{\"elements\": [{\"type\": \"circle\"}]}\n```\nHope it helps {}";
        let decoded = decode(raw)?;
        assert_eq!(Value::Object(decoded), json!({"elements": [{"type": "circle"}]}));
        Ok(())
    }

    #[test]
    fn untagged_fence_is_used_when_no_json_fence_exists() -> anyhow::Result<()> {
        let raw = "Result:\n```\n{\"shapes\": []}\n```";
        assert_eq!(Value::Object(decode(raw)?), json!({"shapes": []}));
        Ok(())
    }

    #[test]
    fn leading_prose_is_sliced_off_and_trailing_text_ignored() -> anyhow::Result<()> {
        let raw = "I found these elements: {\"elements\": [1, 2]} -- let me know!";
        assert_eq!(Value::Object(decode(raw)?), json!({"elements": [1, 2]}));
        Ok(())
    }

    #[test]
    fn fence_content_is_extracted_exactly() {
        let raw = "prefix ```json\n{\"k\": \"v\"}\n``` suffix";
        assert_eq!(candidate_payload(raw), "{\"k\": \"v\"}\n");
    }

    #[test]
    fn text_without_brace_is_a_decode_error() {
        for raw in ["I'm sorry, I can't help with that.", "", "[1, 2, 3]"] {
            assert!(matches!(decode(raw), Err(SketchError::Decode(_))), "{raw:?}");
        }
    }

    #[test]
    fn malformed_or_non_object_payloads_fail() {
        assert!(matches!(decode("{\"a\": "), Err(SketchError::Decode(_))));
        assert!(matches!(decode("```json\n\"text\"\n```"), Err(SketchError::Decode(_))));
    }
}
