use sketchforge_contracts::ProjectOptions;

use super::templates;
use super::tree::ProjectTree;
use super::paths;

/// Static scaffold of a new project. Pure function of `options`.
///
/// Versions from the standalone-default major onward get `app.config.ts`
/// (plus `app.routes.ts`); older ones get `app.module.ts` (plus
/// `app-routing.module.ts`).
pub fn build_skeleton(options: &ProjectOptions) -> ProjectTree {
    let version = options.framework_version();
    let standalone = version.defaults_to_standalone();
    let ext = options.style_ext();
    let mut tree = ProjectTree::new(options.project_slug());

    tree.write("package.json", templates::package_json(options, version));
    tree.write("angular.json", templates::angular_json(options, version));
    tree.write("tsconfig.json", templates::tsconfig_json());
    tree.write("tsconfig.app.json", templates::tsconfig_app_json());
    tree.write("tsconfig.spec.json", templates::tsconfig_spec_json());
    tree.write(paths::README, templates::readme(options, version));

    tree.write("src/index.html", templates::index_html(options));
    tree.write(
        paths::MAIN,
        if standalone {
            templates::main_ts_standalone()
        } else {
            templates::main_ts_module()
        },
    );
    tree.write(&format!("src/styles.{ext}"), templates::global_styles(options));
    tree.write("src/assets/.gitkeep", "");
    tree.write("src/environments/environment.ts", templates::environment(false));
    tree.write("src/environments/environment.prod.ts", templates::environment(true));

    tree.write(
        paths::SHELL_SOURCE,
        templates::shell_component_source(options, standalone, standalone),
    );
    tree.write(
        paths::SHELL_TEMPLATE,
        templates::shell_template(options.display_name(), options.include_routing, &[]),
    );
    tree.write(&paths::shell_style(ext), templates::shell_styles());
    for dir in ["src/app/components", "src/app/services", "src/app/models"] {
        tree.mkdir(dir);
    }

    if standalone {
        tree.write(paths::APP_CONFIG, templates::app_config(options));
        if options.include_routing {
            tree.write(paths::ROUTES, templates::routes_file("[]", &[]));
        }
    } else {
        tree.write(paths::APP_MODULE, templates::app_module(options));
        if options.include_routing {
            tree.write(paths::ROUTING_MODULE, templates::routing_module("[]", &[]));
        }
    }
    tree
}
