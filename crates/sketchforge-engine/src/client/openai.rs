use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::{image_data_url, ModelCall, VisionModel};
use crate::config::EngineConfig;
use crate::error::{SketchError, SketchResult};

/// OpenAI-compatible chat completions with an inlined base64 image.
pub struct OpenAiVisionClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    http: HttpClient,
}

impl OpenAiVisionClient {
    pub fn from_config(config: &EngineConfig) -> SketchResult<Self> {
        let http = HttpClient::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|err| SketchError::Upstream(format!("http client setup failed: {err}")))?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn payload(&self, call: &ModelCall<'_>) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": call.prompt},
                    {"type": "image_url", "image_url": {"url": image_data_url(call.image)}},
                ],
            }],
            "max_tokens": call.max_tokens,
            "temperature": call.temperature,
        })
    }
}

impl VisionModel for OpenAiVisionClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn request(&self, call: &ModelCall<'_>) -> SketchResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SketchError::Upstream("OPENAI_API_KEY not set; cannot reach openai".to_string())
        })?;
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&self.payload(call))
            .send()
            .map_err(|err| SketchError::Upstream(format!("openai transport error: {err}")))?;
        let parsed = response_json_or_error(response)?;
        let text = extract_completion_text(&parsed);
        if text.trim().is_empty() {
            return Err(SketchError::Upstream(
                "openai returned no completion text".to_string(),
            ));
        }
        Ok(text)
    }
}

fn response_json_or_error(response: HttpResponse) -> SketchResult<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| SketchError::Upstream(format!("openai response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(SketchError::Upstream(format!(
            "openai request failed ({code}): {}",
            truncate_text(&body, 512)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|err| SketchError::Upstream(format!("openai returned invalid JSON payload: {err}")))
}

/// `choices[0].message.content`, as a plain string or as a list of text parts.
fn extract_completion_text(response: &Value) -> String {
    let Some(content) = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
    else {
        return String::new();
    };
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
