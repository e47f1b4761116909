use sketchforge_contracts::naming::component_symbol;
use sketchforge_contracts::{GeneratedArtifactBundle, ProjectOptions};

use super::paths;
use super::templates;
use super::tree::ProjectTree;
use crate::error::AdaptationWarning;

const DESCRIPTION_HEADING: &str = "## Project structure";

/// Writes every bundle artifact into the skeleton. Missing categories are
/// no-ops; merging the same bundle into a fresh skeleton always yields the
/// same tree.
pub fn merge(
    tree: &mut ProjectTree,
    bundle: &GeneratedArtifactBundle,
    options: &ProjectOptions,
    warnings: &mut Vec<AdaptationWarning>,
) {
    let ext = options.style_ext();

    for (name, artifact) in &bundle.components {
        let source = artifact.source.clone().unwrap_or_else(|| {
            templates::component_stub(name, &component_symbol(name), artifact.template.is_some(), ext)
        });
        let template = artifact.template.clone().or_else(|| {
            source
                .contains("templateUrl")
                .then(|| format!("<p>{name} works!</p>\n"))
        });
        tree.write(&paths::component_file(name, "ts"), source);
        if let Some(template) = template {
            tree.write(&paths::component_file(name, "html"), template);
        }
        tree.write(
            &paths::component_file(name, ext),
            artifact.style.clone().unwrap_or_default(),
        );
    }

    for (name, source) in &bundle.services {
        tree.write(&paths::service_file(name), source.as_str());
    }
    for (name, source) in &bundle.models {
        tree.write(&paths::model_file(name), source.as_str());
    }
    for (name, source) in &bundle.modules {
        tree.write(&paths::module_file(name), source.as_str());
    }

    if let Some(routing) = &bundle.routing {
        let target = if tree.contains(paths::ROUTES) {
            paths::ROUTES
        } else {
            paths::ROUTING_MODULE
        };
        if options.include_routing {
            tree.write(target, routing.as_str());
        } else {
            warnings.push(AdaptationWarning::new(
                target,
                "routing artifact ignored because routing is disabled",
            ));
        }
    }

    if let Some(shell) = &bundle.app_shell {
        if let Some(source) = &shell.source {
            tree.write(paths::SHELL_SOURCE, source.as_str());
        }
        if let Some(template) = &shell.template {
            tree.write(paths::SHELL_TEMPLATE, template.as_str());
        }
        if let Some(style) = &shell.style {
            tree.write(&paths::shell_style(ext), style.as_str());
        }
    }

    if let Some(description) = &bundle.description {
        let readme = tree.read(paths::README).unwrap_or_default();
        if !readme.contains(description.as_str()) {
            let updated = format!("{}\n{DESCRIPTION_HEADING}\n\n{description}\n", readme.trim_end());
            tree.write(paths::README, updated);
        }
    }
}
