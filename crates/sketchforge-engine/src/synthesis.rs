use std::sync::Arc;

use serde_json::{json, Map, Value};
use sketchforge_contracts::naming::artifact_stem;
use sketchforge_contracts::{ComponentArtifact, EventWriter, GeneratedArtifactBundle, ProjectOptions};

use crate::client::{ModelCall, VisionModel};
use crate::config::EngineConfig;
use crate::decoder;
use crate::error::{SketchError, SketchResult};
use crate::journal;
use crate::prompts::project_synthesis_prompt;

pub const SYNTHESIS_TEMPERATURE: f64 = 0.2;

const SOURCE_KEYS: [&str; 3] = ["ts", "typescript", "source"];
const TEMPLATE_KEYS: [&str; 2] = ["html", "template"];
const STYLE_KEYS: [&str; 5] = ["scss", "css", "less", "style", "styles"];
const SHELL_KEYS: [&str; 2] = ["app", "app-root"];

/// One-shot request for a full artifact bundle. Retrying is the caller's
/// call to make.
pub struct SynthesisRequestor {
    model: Arc<dyn VisionModel>,
    max_tokens: u64,
    events: EventWriter,
}

impl SynthesisRequestor {
    pub fn new(model: Arc<dyn VisionModel>, config: &EngineConfig, events: EventWriter) -> Self {
        Self {
            model,
            max_tokens: config.synthesis_max_tokens,
            events,
        }
    }

    pub fn synthesize(
        &self,
        image: &[u8],
        options: &ProjectOptions,
    ) -> SketchResult<GeneratedArtifactBundle> {
        let options_json = serde_json::to_string(options)
            .map_err(|err| SketchError::InvalidInput(format!("options not serializable: {err}")))?;
        let prompt = project_synthesis_prompt(&options_json);
        let raw = self.model.request(&ModelCall {
            prompt: &prompt,
            image,
            temperature: SYNTHESIS_TEMPERATURE,
            max_tokens: self.max_tokens,
        })?;
        let object = decoder::decode(&raw)?;
        let bundle = parse_bundle(&object)?;

        tracing::info!(
            components = bundle.components.len(),
            services = bundle.services.len(),
            models = bundle.models.len(),
            "artifact bundle decoded"
        );
        journal(
            &self.events,
            "synthesis_completed",
            json!({
                "model": self.model.name(),
                "components": bundle.component_names(),
                "services": bundle.service_names(),
                "models": bundle.models.keys().collect::<Vec<_>>(),
                "modules": bundle.modules.keys().collect::<Vec<_>>(),
                "routing": bundle.routing.is_some(),
                "app_shell": bundle.app_shell.is_some(),
            }),
        );
        Ok(bundle)
    }
}

/// Shape-validates a decoded reply.
///
/// Missing categories are empty. A category of the wrong JSON type is a
/// [`SketchError::Decode`]; individual unusable entries are skipped.
pub fn parse_bundle(object: &Map<String, Value>) -> SketchResult<GeneratedArtifactBundle> {
    let mut bundle = GeneratedArtifactBundle::default();

    let mut shell_from_components = None;
    if let Some(components) = category(object, "components")? {
        for (raw_name, value) in components {
            let name = artifact_stem(raw_name, "component");
            let Some(artifact) = component_artifact(value) else {
                tracing::debug!(component = %raw_name, "skipping unusable component entry");
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if SHELL_KEYS.contains(&name.as_str()) {
                shell_from_components = Some(artifact);
                continue;
            }
            bundle.components.insert(name, artifact);
        }
    }

    for (key, suffix, target) in [
        ("services", "service", &mut bundle.services),
        ("models", "model", &mut bundle.models),
        ("modules", "module", &mut bundle.modules),
    ] {
        let Some(entries) = category(object, key)? else {
            continue;
        };
        for (raw_name, value) in entries {
            let name = artifact_stem(raw_name, suffix);
            match source_text(value) {
                Some(text) if !name.is_empty() => {
                    target.insert(name, text);
                }
                _ => tracing::debug!(category = key, entry = %raw_name, "skipping unusable entry"),
            }
        }
    }

    bundle.routing = match object.get("routing") {
        None | Some(Value::Null) => None,
        Some(value) => Some(source_text(value).ok_or_else(|| {
            SketchError::Decode("`routing` must be a source string".to_string())
        })?)
        .filter(|text| !text.trim().is_empty()),
    };

    bundle.app_shell = match object.get("appShell") {
        None | Some(Value::Null) => shell_from_components,
        Some(value @ Value::Object(_)) => component_artifact(value),
        Some(_) => {
            return Err(SketchError::Decode(
                "`appShell` must be an object".to_string(),
            ))
        }
    };

    bundle.description = match object.get("projectStructure") {
        Some(Value::Object(structure)) => structure
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
    .map(|text| text.trim().to_string())
    .filter(|text| !text.is_empty());

    Ok(bundle)
}

fn category<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> SketchResult<Option<&'a Map<String, Value>>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(entries)) => Ok(Some(entries)),
        Some(_) => Err(SketchError::Decode(format!("`{key}` must be an object"))),
    }
}

fn first_text(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// A bare string is taken as the component's TypeScript source.
fn component_artifact(value: &Value) -> Option<ComponentArtifact> {
    let artifact = match value {
        Value::String(text) if !text.trim().is_empty() => ComponentArtifact {
            source: Some(text.clone()),
            ..ComponentArtifact::default()
        },
        Value::Object(entry) => ComponentArtifact {
            source: first_text(entry, &SOURCE_KEYS),
            template: first_text(entry, &TEMPLATE_KEYS),
            style: first_text(entry, &STYLE_KEYS),
        },
        _ => return None,
    };
    (!artifact.is_empty()).then_some(artifact)
}

fn source_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(entry) => first_text(entry, &SOURCE_KEYS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedModel;

    fn decoded(text: &str) -> anyhow::Result<Map<String, Value>> {
        Ok(decoder::decode(text)?)
    }

    #[test]
    fn parses_every_category_with_normalized_keys() -> anyhow::Result<()> {
        let object = decoded(
            r#"{
              "projectStructure": {"description": "A login screen"},
              "components": {
                "LoginForm": {"ts": "export class LoginFormComponent {}", "html": "<form></form>", "css": "form {}"},
                "user-list-component": {"typescript": "export class UserListComponent {}"},
                "broken": 42
              },
              "services": {"auth-service": "export class AuthService {}", "empty": ""},
              "models": {"user": "export interface User {}"},
              "modules": {"shared": "export class SharedModule {}"},
              "routing": "const routes: Routes = [];"
            }"#,
        )?;
        let bundle = parse_bundle(&object)?;

        assert_eq!(bundle.component_names(), vec!["login-form", "user-list"]);
        let login = &bundle.components["login-form"];
        assert_eq!(login.template.as_deref(), Some("<form></form>"));
        assert_eq!(login.style.as_deref(), Some("form {}"));
        assert_eq!(bundle.service_names(), vec!["auth"]);
        assert!(bundle.models.contains_key("user"));
        assert!(bundle.modules.contains_key("shared"));
        assert!(bundle.routing.is_some());
        assert_eq!(bundle.description.as_deref(), Some("A login screen"));
        assert!(bundle.app_shell.is_none());
        Ok(())
    }

    #[test]
    fn missing_keys_are_empty_and_wrong_types_fail() -> anyhow::Result<()> {
        let bundle = parse_bundle(&decoded("{}")?)?;
        assert!(bundle.is_empty());

        for bad in [
            r#"{"components": []}"#,
            r#"{"services": "nope"}"#,
            r#"{"routing": 5}"#,
            r#"{"appShell": "html"}"#,
        ] {
            assert!(
                matches!(parse_bundle(&decoded(bad)?), Err(SketchError::Decode(_))),
                "{bad}"
            );
        }
        Ok(())
    }

    #[test]
    fn root_component_entry_becomes_the_shell_override() -> anyhow::Result<()> {
        let bundle = parse_bundle(&decoded(
            r#"{"components": {"app-root": {"html": "<main></main>"}, "home": {"ts": "x"}}}"#,
        )?)?;
        assert_eq!(bundle.component_names(), vec!["home"]);
        let shell = bundle.app_shell.expect("shell override");
        assert_eq!(shell.template.as_deref(), Some("<main></main>"));

        let explicit = parse_bundle(&decoded(
            r#"{"components": {"app": {"html": "ignored"}}, "appShell": {"html": "<nav></nav>"}}"#,
        )?)?;
        assert_eq!(
            explicit.app_shell.and_then(|shell| shell.template).as_deref(),
            Some("<nav></nav>")
        );
        Ok(())
    }

    #[test]
    fn synthesize_sends_options_once_and_surfaces_failures() -> anyhow::Result<()> {
        let model = Arc::new(ScriptedModel::replying(
            "```json\n{\"components\": {\"login-form\": {\"ts\": \"x\"}}}\n```",
        ));
        let requestor =
            SynthesisRequestor::new(model.clone(), &EngineConfig::default(), EventWriter::disabled("t"));
        let options = ProjectOptions {
            name: "Shop Admin".to_string(),
            ..ProjectOptions::default()
        };
        let bundle = requestor.synthesize(b"img", &options)?;
        assert_eq!(bundle.component_names(), vec!["login-form"]);
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"name\":\"Shop Admin\""));

        let failing = SynthesisRequestor::new(
            Arc::new(ScriptedModel::replying("I cannot do that")),
            &EngineConfig::default(),
            EventWriter::disabled("t"),
        );
        assert!(matches!(
            failing.synthesize(b"img", &options),
            Err(SketchError::Decode(_))
        ));
        Ok(())
    }
}
