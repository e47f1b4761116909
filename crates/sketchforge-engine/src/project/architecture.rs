use serde::Serialize;
use serde_json::Value;
use sketchforge_contracts::options::STANDALONE_DEFAULT_MAJOR;
use sketchforge_contracts::{FrameworkVersion, ProjectOptions};

use super::paths;
use super::source_edit::has_standalone_flag;
use super::tree::ProjectTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitectureKind {
    /// Components registered through one central `@NgModule`.
    ModuleBased,
    /// Components declare their own dependencies.
    StandaloneBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectArchitecture {
    pub kind: ArchitectureKind,
    /// `None` when neither the manifest nor the options name a version.
    pub version: Option<FrameworkVersion>,
}

impl ProjectArchitecture {
    pub fn is_standalone(&self) -> bool {
        self.kind == ArchitectureKind::StandaloneBased
    }

    /// Resolved major version, `0` if undetermined.
    pub fn major(&self) -> u32 {
        self.version.map_or(0, |version| version.major)
    }

    /// `styleUrl` (single string) is the convention from the standalone
    /// default major onward; older versions only know `styleUrls`.
    pub fn singular_style_url(&self) -> bool {
        self.major() >= STANDALONE_DEFAULT_MAJOR
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            ArchitectureKind::ModuleBased => "module-based",
            ArchitectureKind::StandaloneBased => "standalone",
        }
    }
}

/// Everything detection looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectionInputs {
    pub version: Option<FrameworkVersion>,
    pub shell_has_standalone_marker: bool,
    pub has_app_config: bool,
    pub has_routes_file: bool,
    pub has_routing_module: bool,
}

impl DetectionInputs {
    /// Version comes from `package.json`'s `@angular/core`, falling back to
    /// the requested options.
    pub fn from_tree(tree: &ProjectTree, options: &ProjectOptions) -> Self {
        let manifest_version = tree
            .read(paths::PACKAGE_JSON)
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|manifest| {
                manifest
                    .get("dependencies")
                    .and_then(|deps| deps.get("@angular/core"))
                    .and_then(Value::as_str)
                    .and_then(FrameworkVersion::parse)
            });
        Self {
            version: manifest_version.or_else(|| FrameworkVersion::parse(&options.version)),
            shell_has_standalone_marker: tree
                .read(paths::SHELL_SOURCE)
                .is_some_and(has_standalone_flag),
            has_app_config: tree.contains(paths::APP_CONFIG),
            has_routes_file: tree.contains(paths::ROUTES),
            has_routing_module: tree.contains(paths::ROUTING_MODULE),
        }
    }
}

/// Pure: the same inputs always select the same architecture.
pub fn detect_architecture(inputs: &DetectionInputs) -> ProjectArchitecture {
    let standalone = inputs
        .version
        .is_some_and(FrameworkVersion::defaults_to_standalone)
        || inputs.shell_has_standalone_marker
        || inputs.has_app_config
        || (inputs.has_routes_file && !inputs.has_routing_module);
    ProjectArchitecture {
        kind: if standalone {
            ArchitectureKind::StandaloneBased
        } else {
            ArchitectureKind::ModuleBased
        },
        version: inputs.version,
    }
}
