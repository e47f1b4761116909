//! Skeleton → merge → detect → adapt. The result is a complete in-memory
//! project ready for staging and packing.

pub mod adapter;
pub mod architecture;
pub mod merger;
pub mod skeleton;
pub mod source_edit;
pub mod templates;
pub mod tree;

pub use adapter::adapt;
pub use architecture::{detect_architecture, ArchitectureKind, DetectionInputs, ProjectArchitecture};
pub use merger::merge;
pub use skeleton::build_skeleton;
pub use tree::ProjectTree;

use sketchforge_contracts::{GeneratedArtifactBundle, ProjectOptions};

use crate::error::AdaptationWarning;

/// Well-known project-relative paths.
pub mod paths {
    pub const PACKAGE_JSON: &str = "package.json";
    pub const README: &str = "README.md";
    pub const MAIN: &str = "src/main.ts";
    pub const SHELL_SOURCE: &str = "src/app/app.component.ts";
    pub const SHELL_TEMPLATE: &str = "src/app/app.component.html";
    pub const APP_CONFIG: &str = "src/app/app.config.ts";
    pub const ROUTES: &str = "src/app/app.routes.ts";
    pub const APP_MODULE: &str = "src/app/app.module.ts";
    pub const ROUTING_MODULE: &str = "src/app/app-routing.module.ts";

    pub fn shell_style(ext: &str) -> String {
        format!("src/app/app.component.{ext}")
    }

    pub fn component_file(name: &str, ext: &str) -> String {
        format!("src/app/components/{name}/{name}.component.{ext}")
    }

    pub fn service_file(name: &str) -> String {
        format!("src/app/services/{name}.service.ts")
    }

    pub fn model_file(name: &str) -> String {
        format!("src/app/models/{name}.model.ts")
    }

    pub fn module_file(name: &str) -> String {
        format!("src/app/{name}.module.ts")
    }

    /// Import specifier of a component, relative to `src/app`.
    pub fn component_import(name: &str) -> String {
        format!("./components/{name}/{name}.component")
    }

    pub fn service_import(name: &str) -> String {
        format!("./services/{name}.service")
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedProject {
    pub tree: ProjectTree,
    pub architecture: ProjectArchitecture,
    pub warnings: Vec<AdaptationWarning>,
}

/// Detection runs once, after merging, and the result is threaded through
/// every adapter step.
pub fn materialize(bundle: &GeneratedArtifactBundle, options: &ProjectOptions) -> MaterializedProject {
    let mut tree = build_skeleton(options);
    let mut warnings = Vec::new();
    merge(&mut tree, bundle, options, &mut warnings);
    let architecture = detect_architecture(&DetectionInputs::from_tree(&tree, options));
    adapt(&mut tree, bundle, options, architecture, &mut warnings);
    MaterializedProject {
        tree,
        architecture,
        warnings,
    }
}
