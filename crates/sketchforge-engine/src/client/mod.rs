//! Generative client: one prompt plus one image in, raw completion text out.
//!
//! Back ends never retry; escalation is the extraction controller's job.

mod dryrun;
mod openai;

pub use dryrun::DryrunVisionModel;
pub use openai::OpenAiVisionClient;

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;

use crate::config::EngineConfig;
use crate::error::{SketchError, SketchResult};

#[derive(Debug, Clone, Copy)]
pub struct ModelCall<'a> {
    pub prompt: &'a str,
    pub image: &'a [u8],
    pub temperature: f64,
    pub max_tokens: u64,
}

pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;
    fn request(&self, call: &ModelCall<'_>) -> SketchResult<String>;
}

#[derive(Default)]
pub struct VisionModelRegistry {
    models: BTreeMap<String, Arc<dyn VisionModel>>,
}

impl VisionModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: VisionModel + 'static>(&mut self, model: M) {
        self.models
            .insert(model.name().to_string(), Arc::new(model));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn VisionModel>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// The back end named by `config.provider`.
    pub fn resolve(&self, config: &EngineConfig) -> SketchResult<Arc<dyn VisionModel>> {
        self.get(&config.provider).ok_or_else(|| {
            SketchError::InvalidInput(format!(
                "unknown model provider '{}' (available: {})",
                config.provider,
                self.names().join(", ")
            ))
        })
    }
}

pub fn default_registry(config: &EngineConfig) -> SketchResult<VisionModelRegistry> {
    let mut registry = VisionModelRegistry::new();
    registry.register(DryrunVisionModel);
    registry.register(OpenAiVisionClient::from_config(config)?);
    Ok(registry)
}

/// Strips a `data:<mime>;base64,` prefix from a caller-supplied payload.
pub fn strip_data_uri(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("data:") {
        return trimmed;
    }
    match trimmed.find("base64,") {
        Some(idx) => &trimmed[idx + "base64,".len()..],
        None => trimmed,
    }
}

/// Decodes a base64 canvas snapshot, with or without a `data:` URI prefix.
pub fn decode_image_payload(raw: &str) -> SketchResult<Vec<u8>> {
    let body: String = strip_data_uri(raw)
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    if body.is_empty() {
        return Err(SketchError::InvalidInput(
            "a canvas image is required".to_string(),
        ));
    }
    BASE64
        .decode(body.as_bytes())
        .map_err(|err| SketchError::InvalidInput(format!("canvas image is not base64: {err}")))
}

pub fn image_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn image_data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", image_mime(bytes), BASE64.encode(bytes))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays canned replies in order and records every call it receives.
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<SketchResult<String>>>,
        pub(crate) calls: Mutex<Vec<(String, f64)>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<SketchResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub(crate) fn temperatures(&self) -> Vec<f64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, temperature)| *temperature)
                .collect()
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(prompt, _)| prompt.clone())
                .collect()
        }
    }

    impl VisionModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn request(&self, call: &ModelCall<'_>) -> SketchResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((call.prompt.to_string(), call.temperature));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SketchError::Upstream("script exhausted".to_string())))
        }
    }
}
