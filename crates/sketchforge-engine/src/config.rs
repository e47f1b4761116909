use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u64 = 4000;
pub const DEFAULT_SYNTHESIS_MAX_TOKENS: u64 = 16000;

/// Runtime settings for the generative back end, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Registry name of the back end (`openai` or `dryrun`).
    pub provider: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u64,
    pub synthesis_max_tokens: u64,
    /// `None` leaves upstream calls unbounded.
    pub upstream_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: "dryrun".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            synthesis_max_tokens: DEFAULT_SYNTHESIS_MAX_TOKENS,
            upstream_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                lookup(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };

        let api_key = first(&["SKETCHFORGE_API_KEY", "OPENAI_API_KEY"]);
        let provider = first(&["SKETCHFORGE_PROVIDER"])
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_else(|| {
                if api_key.is_some() {
                    "openai".to_string()
                } else {
                    "dryrun".to_string()
                }
            });
        let api_base = first(&["SKETCHFORGE_API_BASE", "OPENAI_API_BASE", "OPENAI_BASE_URL"])
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let parse_u64 = |keys: &[&str]| first(keys).and_then(|value| value.parse::<u64>().ok());

        Self {
            provider,
            api_base,
            api_key,
            model: first(&["SKETCHFORGE_VISION_MODEL"])
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            max_tokens: parse_u64(&["SKETCHFORGE_MAX_TOKENS"])
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            synthesis_max_tokens: parse_u64(&["SKETCHFORGE_SYNTHESIS_MAX_TOKENS"])
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_SYNTHESIS_MAX_TOKENS),
            upstream_timeout: parse_u64(&["SKETCHFORGE_UPSTREAM_TIMEOUT_SECS"])
                .filter(|value| *value > 0)
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_dryrun_without_a_key() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn key_selects_openai_and_overrides_apply() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", " sk-test "),
            ("OPENAI_API_BASE", "http://localhost:8080/v1/"),
            ("SKETCHFORGE_MAX_TOKENS", "1200"),
            ("SKETCHFORGE_UPSTREAM_TIMEOUT_SECS", "90"),
            ("SKETCHFORGE_SYNTHESIS_MAX_TOKENS", "zero"),
        ]));
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.max_tokens, 1200);
        assert_eq!(config.synthesis_max_tokens, DEFAULT_SYNTHESIS_MAX_TOKENS);
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn explicit_provider_wins() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SKETCHFORGE_API_KEY", "sk-test"),
            ("SKETCHFORGE_PROVIDER", "DryRun"),
        ]));
        assert_eq!(config.provider, "dryrun");
    }
}
