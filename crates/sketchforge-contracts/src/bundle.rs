use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Source fragments produced by one synthesis call.
///
/// Keys are kebab-case artifact names. Ordered maps keep file writes and
/// adapter edits reproducible; the model's key order carries no meaning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedArtifactBundle {
    pub components: BTreeMap<String, ComponentArtifact>,
    pub services: BTreeMap<String, String>,
    pub models: BTreeMap<String, String>,
    pub modules: BTreeMap<String, String>,
    pub routing: Option<String>,
    pub app_shell: Option<ComponentArtifact>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentArtifact {
    pub source: Option<String>,
    pub template: Option<String>,
    pub style: Option<String>,
}

impl ComponentArtifact {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.template.is_none() && self.style.is_none()
    }
}

impl GeneratedArtifactBundle {
    pub fn component_names(&self) -> Vec<&str> {
        self.components.keys().map(String::as_str).collect()
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.services.is_empty()
            && self.models.is_empty()
            && self.modules.is_empty()
            && self.routing.is_none()
            && self.app_shell.is_none()
    }
}
