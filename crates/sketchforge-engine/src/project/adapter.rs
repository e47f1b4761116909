//! Rewrites merged artifacts so they agree with the detected architecture.
//!
//! Every step is an anchor-based edit from [`super::source_edit`]; a missing
//! anchor skips that edit and records an [`AdaptationWarning`].

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use sketchforge_contracts::naming::{component_symbol, route_path, service_symbol};
use sketchforge_contracts::{GeneratedArtifactBundle, ProjectOptions};

use super::architecture::ProjectArchitecture;
use super::paths;
use super::source_edit::{
    add_to_decorator_list, align_style_urls, align_template_url, contains_word,
    ensure_decorator_list, ensure_import, ensure_standalone_flag, matching_close,
    remove_decorator_property,
};
use super::templates;
use super::tree::ProjectTree;
use crate::error::AdaptationWarning;

const ANGULAR_COMMON: &str = "@angular/common";
const ANGULAR_FORMS: &str = "@angular/forms";
const ANGULAR_ROUTER: &str = "@angular/router";

const REACTIVE_FORM_MARKERS: [&str; 5] =
    ["formGroup", "FormGroup", "FormBuilder", "formControl", "FormControl"];

pub fn adapt(
    tree: &mut ProjectTree,
    bundle: &GeneratedArtifactBundle,
    options: &ProjectOptions,
    architecture: ProjectArchitecture,
    warnings: &mut Vec<AdaptationWarning>,
) {
    tracing::debug!(
        architecture = architecture.label(),
        major = architecture.major(),
        components = bundle.components.len(),
        "adapting project"
    );
    for name in bundle.components.keys() {
        adapt_component(tree, name, options, architecture, warnings);
    }
    if architecture.is_standalone() {
        ensure_standalone_bootstrap(tree, options);
    } else {
        register_in_module(tree, bundle, warnings);
    }
    if options.include_routing {
        adapt_routing(tree, bundle, architecture, warnings);
    }
    adapt_shell(tree, bundle, options, architecture, warnings);
}

fn adapt_component(
    tree: &mut ProjectTree,
    name: &str,
    options: &ProjectOptions,
    architecture: ProjectArchitecture,
    warnings: &mut Vec<AdaptationWarning>,
) {
    let ext = options.style_ext();
    let path = paths::component_file(name, "ts");
    let template_path = paths::component_file(name, "html");
    let Some(source) = tree.read(&path) else {
        return;
    };
    let template = tree.read(&template_path).unwrap_or_default();

    let mut text = align_style_urls(
        source,
        ext,
        architecture.singular_style_url(),
        Some(&format!("./{name}.component.{ext}")),
    );
    if tree.contains(&template_path) {
        text = align_template_url(&text, &format!("./{name}.component.html"));
    }

    if architecture.is_standalone() {
        let usage = format!("{text}\n{template}");
        let mut needed = vec![("CommonModule", ANGULAR_COMMON)];
        if REACTIVE_FORM_MARKERS.iter().any(|marker| usage.contains(marker)) {
            needed.push(("ReactiveFormsModule", ANGULAR_FORMS));
        }
        if usage.contains("ngModel") {
            needed.push(("FormsModule", ANGULAR_FORMS));
        }
        if template.contains("routerLink") {
            needed.push(("RouterLink", ANGULAR_ROUTER));
        }
        text = make_standalone(&text, &path, &needed, warnings);
    } else {
        text = remove_decorator_property(&text, "Component", "standalone");
        text = remove_decorator_property(&text, "Component", "imports");
    }

    if tree.read(&path) != Some(text.as_str()) {
        tree.write(&path, text);
    }
}

/// `standalone: true`, the `imports` list and the matching import
/// statements. Returns the text unchanged when `@Component` is missing.
fn make_standalone(
    source: &str,
    path: &str,
    needed: &[(&str, &str)],
    warnings: &mut Vec<AdaptationWarning>,
) -> String {
    let Some(flagged) = ensure_standalone_flag(source, "Component") else {
        warnings.push(AdaptationWarning::new(
            path,
            "no @Component decorator; standalone conversion skipped",
        ));
        return source.to_string();
    };
    let symbols: Vec<String> = needed.iter().map(|(symbol, _)| symbol.to_string()).collect();
    let Some(mut text) = ensure_decorator_list(&flagged, "Component", "imports", &symbols) else {
        warnings.push(AdaptationWarning::new(path, "could not update the imports list"));
        return flagged;
    };
    for (symbol, module) in needed {
        text = ensure_import(&text, symbol, module);
    }
    text
}

/// Registers every component under `declarations` and every service under
/// `providers` of the central module. Applying it twice changes nothing.
pub fn register_in_module(
    tree: &mut ProjectTree,
    bundle: &GeneratedArtifactBundle,
    warnings: &mut Vec<AdaptationWarning>,
) {
    if bundle.components.is_empty() && bundle.services.is_empty() {
        return;
    }
    let Some(source) = tree.read(paths::APP_MODULE) else {
        warnings.push(AdaptationWarning::new(
            paths::APP_MODULE,
            "central module missing; components and services were not registered",
        ));
        return;
    };
    let mut text = source.to_string();

    for name in bundle.components.keys() {
        let symbol = component_symbol(name);
        match add_to_decorator_list(&text, "NgModule", "declarations", &symbol) {
            Some(updated) => {
                text = ensure_import(&updated, &symbol, &paths::component_import(name));
            }
            None => warnings.push(AdaptationWarning::new(
                paths::APP_MODULE,
                format!("no declarations list; {symbol} was not declared"),
            )),
        }
    }
    for name in bundle.services.keys() {
        let symbol = service_symbol(name);
        match ensure_decorator_list(&text, "NgModule", "providers", std::slice::from_ref(&symbol)) {
            Some(updated) => {
                text = ensure_import(&updated, &symbol, &paths::service_import(name));
            }
            None => warnings.push(AdaptationWarning::new(
                paths::APP_MODULE,
                format!("no @NgModule decorator; {symbol} was not provided"),
            )),
        }
    }

    if tree.read(paths::APP_MODULE) != Some(text.as_str()) {
        tree.write(paths::APP_MODULE, text);
    }
}

/// A standalone project boots through `bootstrapApplication` with an
/// `app.config.ts`; module files left from the skeleton are dropped.
fn ensure_standalone_bootstrap(tree: &mut ProjectTree, options: &ProjectOptions) {
    if !tree.contains(paths::APP_CONFIG) {
        tree.write(paths::APP_CONFIG, templates::app_config(options));
    }
    let bootstraps = tree
        .read(paths::MAIN)
        .is_some_and(|main| main.contains("bootstrapApplication"));
    if !bootstraps {
        tree.write(paths::MAIN, templates::main_ts_standalone());
    }
    if tree.remove(paths::APP_MODULE).is_some() {
        tracing::debug!("removed central module from standalone project");
    }
    if !options.include_routing {
        tree.remove(paths::ROUTING_MODULE);
    }
}

fn route_list_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?::\s*Routes\s*|\broutes\s*)=\s*\[|forRoot\(\s*\[").expect("route list pattern")
    })
}

fn standalone_routes_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"export\s+const\s+routes\b").expect("routes export pattern"))
}

/// The bracketed route list of a routes file or routing module.
fn extract_route_list(source: &str) -> Option<&str> {
    let found = route_list_pattern().find(source)?;
    let open = found.end() - 1;
    let close = matching_close(source, open)?;
    Some(&source[open..=close])
}

fn has_expected_shape(routing: &str, standalone: bool) -> bool {
    let is_module = routing.contains("@NgModule");
    if standalone {
        !is_module && standalone_routes_pattern().is_match(routing)
    } else {
        is_module && routing.contains("forRoot(") && contains_word(routing, "AppRoutingModule")
    }
}

/// Redirect from `''` to the first component, then one route each. A
/// component whose route path is already taken gets no route and a warning.
fn synthesized_route_list(
    bundle: &GeneratedArtifactBundle,
    target: &str,
    warnings: &mut Vec<AdaptationWarning>,
) -> String {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut routes = Vec::new();
    for name in bundle.components.keys() {
        let path = route_path(name);
        if let Some(owner) = owners.get(&path) {
            warnings.push(AdaptationWarning::new(
                target,
                format!("`{name}` shares route path '{path}' with `{owner}`; no route added"),
            ));
            continue;
        }
        if routes.is_empty() {
            routes.push(format!("  {{ path: '', redirectTo: '{path}', pathMatch: 'full' }}"));
        }
        routes.push(format!(
            "  {{ path: '{path}', component: {} }}",
            component_symbol(name)
        ));
        owners.insert(path, name);
    }
    if routes.is_empty() {
        return "[]".to_string();
    }
    format!("[\n{}\n]", routes.join(",\n"))
}

/// Components whose symbol appears in `text`, as `(symbol, import path)`.
fn referenced_components(bundle: &GeneratedArtifactBundle, text: &str) -> Vec<(String, String)> {
    bundle
        .components
        .keys()
        .map(|name| (component_symbol(name), paths::component_import(name)))
        .filter(|(symbol, _)| contains_word(text, symbol))
        .collect()
}

fn adapt_routing(
    tree: &mut ProjectTree,
    bundle: &GeneratedArtifactBundle,
    architecture: ProjectArchitecture,
    warnings: &mut Vec<AdaptationWarning>,
) {
    let standalone = architecture.is_standalone();
    let (target, stale) = if standalone {
        (paths::ROUTES, paths::ROUTING_MODULE)
    } else {
        (paths::ROUTING_MODULE, paths::ROUTES)
    };
    let render = |list: &str| {
        let imports = referenced_components(bundle, list);
        if standalone {
            templates::routes_file(list, &imports)
        } else {
            templates::routing_module(list, &imports)
        }
    };

    let content = match &bundle.routing {
        Some(routing) if has_expected_shape(routing, standalone) => {
            referenced_components(bundle, routing)
                .into_iter()
                .fold(routing.clone(), |text, (symbol, module)| {
                    ensure_import(&text, &symbol, &module)
                })
        }
        Some(routing) => match extract_route_list(routing) {
            Some(list) => render(list),
            None => {
                warnings.push(AdaptationWarning::new(
                    target,
                    "generated routing has no route list; routes were synthesized",
                ));
                render(&synthesized_route_list(bundle, target, warnings))
            }
        },
        None => render(&synthesized_route_list(bundle, target, warnings)),
    };

    tree.write(target, content);
    tree.remove(stale);
}

fn adapt_shell(
    tree: &mut ProjectTree,
    bundle: &GeneratedArtifactBundle,
    options: &ProjectOptions,
    architecture: ProjectArchitecture,
    warnings: &mut Vec<AdaptationWarning>,
) {
    let ext = options.style_ext();
    let shell = bundle.app_shell.as_ref();
    let names: Vec<String> = bundle.components.keys().cloned().collect();

    if shell.and_then(|shell| shell.template.as_ref()).is_none() {
        tree.write(
            paths::SHELL_TEMPLATE,
            templates::shell_template(options.display_name(), options.include_routing, &names),
        );
    }
    if shell.and_then(|shell| shell.style.as_ref()).is_none() {
        tree.write(&paths::shell_style(ext), templates::shell_styles());
    }

    let Some(source) = tree.read(paths::SHELL_SOURCE) else {
        warnings.push(AdaptationWarning::new(paths::SHELL_SOURCE, "shell component missing"));
        return;
    };
    let mut text = align_style_urls(
        source,
        ext,
        architecture.singular_style_url(),
        Some(&format!("./app.component.{ext}")),
    );

    if architecture.is_standalone() {
        let mut needed: Vec<(String, String)> = vec![
            ("CommonModule".to_string(), ANGULAR_COMMON.to_string()),
            ("RouterOutlet".to_string(), ANGULAR_ROUTER.to_string()),
        ];
        if options.include_routing {
            needed.push(("RouterLink".to_string(), ANGULAR_ROUTER.to_string()));
            needed.push(("RouterLinkActive".to_string(), ANGULAR_ROUTER.to_string()));
        }
        needed.extend(
            names
                .iter()
                .map(|name| (component_symbol(name), paths::component_import(name))),
        );
        let needed: Vec<(&str, &str)> = needed
            .iter()
            .map(|(symbol, module)| (symbol.as_str(), module.as_str()))
            .collect();
        text = make_standalone(&text, paths::SHELL_SOURCE, &needed, warnings);
    } else {
        text = remove_decorator_property(&text, "Component", "standalone");
        text = remove_decorator_property(&text, "Component", "imports");
    }

    if tree.read(paths::SHELL_SOURCE) != Some(text.as_str()) {
        tree.write(paths::SHELL_SOURCE, text);
    }
}

#[cfg(test)]
mod tests {
    use sketchforge_contracts::ComponentArtifact;

    use super::*;
    use crate::project::materialize;

    fn component(name: &str, template: &str) -> ComponentArtifact {
        let symbol = component_symbol(name);
        ComponentArtifact {
            source: Some(format!(
                "import {{ Component }} from '@angular/core';\n\n@Component({{\n  selector: '{name}',\n  templateUrl: './{name}.component.html',\n  styleUrls: ['./{name}.component.css']\n}})\nexport class {symbol} {{ }}\n"
            )),
            template: Some(template.to_string()),
            style: None,
        }
    }

    fn modern(include_routing: bool) -> ProjectOptions {
        ProjectOptions {
            name: "Sketch App".to_string(),
            version: "17.3".to_string(),
            include_routing,
            ..ProjectOptions::default()
        }
    }

    fn legacy(include_routing: bool) -> ProjectOptions {
        ProjectOptions {
            version: "16.2".to_string(),
            ..modern(include_routing)
        }
    }

    #[test]
    fn single_component_without_routing_is_inlined_in_shell() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle.components.insert(
            "login-form".to_string(),
            component("login-form", "<form [formGroup]=\"form\"></form>"),
        );
        let project = materialize(&bundle, &modern(false));
        let tree = &project.tree;

        assert!(project.architecture.is_standalone());
        assert!(project.warnings.is_empty(), "{:?}", project.warnings);
        let shell_html = tree.read(paths::SHELL_TEMPLATE).unwrap_or_default();
        assert!(shell_html.contains("<login-form></login-form>"));
        assert!(!shell_html.contains("<nav"));
        assert!(!tree.contains(paths::ROUTES));

        let login = tree
            .read("src/app/components/login-form/login-form.component.ts")
            .unwrap_or_default();
        assert!(login.contains("standalone: true"));
        assert!(login.contains("imports: [CommonModule, ReactiveFormsModule]"));
        assert!(login.contains("import { ReactiveFormsModule } from '@angular/forms';"));
        assert!(login.contains("styleUrl: './login-form.component.scss'"));

        let shell = tree.read(paths::SHELL_SOURCE).unwrap_or_default();
        assert!(shell.contains("LoginFormComponent"));
        assert!(shell
            .contains("import { LoginFormComponent } from './components/login-form/login-form.component';"));
    }

    #[test]
    fn colliding_route_paths_keep_the_first_component() {
        let mut bundle = GeneratedArtifactBundle::default();
        for name in ["app-dashboard", "dashboard"] {
            bundle
                .components
                .insert(name.to_string(), component(name, "<section></section>"));
        }
        let project = materialize(&bundle, &modern(true));

        let routes = project.tree.read(paths::ROUTES).unwrap_or_default();
        assert_eq!(routes.matches("path: 'dashboard'").count(), 1);
        assert!(routes.contains("{ path: 'dashboard', component: AppDashboardComponent }"));
        assert!(!routes.contains("component: DashboardComponent"));
        assert_eq!(project.warnings.len(), 1);
        assert_eq!(project.warnings[0].file, paths::ROUTES);
        assert!(project.warnings[0].message.contains("`dashboard`"));

        let shell_html = project.tree.read(paths::SHELL_TEMPLATE).unwrap_or_default();
        assert_eq!(shell_html.matches("routerLink=\"/dashboard\"").count(), 1);
    }

    #[test]
    fn routed_components_get_routes_and_navigation() {
        let mut bundle = GeneratedArtifactBundle::default();
        for name in ["dashboard", "settings"] {
            bundle
                .components
                .insert(name.to_string(), component(name, "<section></section>"));
        }
        let project = materialize(&bundle, &modern(true));
        let tree = &project.tree;

        let routes = tree.read(paths::ROUTES).unwrap_or_default();
        assert!(routes.contains("export const routes: Routes"));
        assert!(routes.contains("{ path: '', redirectTo: 'dashboard', pathMatch: 'full' }"));
        assert!(routes.contains("{ path: 'dashboard', component: DashboardComponent }"));
        assert!(routes.contains("{ path: 'settings', component: SettingsComponent }"));
        assert!(routes.contains(
            "import { SettingsComponent } from './components/settings/settings.component';"
        ));

        let shell_html = tree.read(paths::SHELL_TEMPLATE).unwrap_or_default();
        assert!(shell_html.contains("routerLink=\"/dashboard\""));
        assert!(shell_html.contains("routerLink=\"/settings\""));
        assert!(shell_html.contains("<router-outlet></router-outlet>"));

        let shell = tree.read(paths::SHELL_SOURCE).unwrap_or_default();
        for symbol in ["RouterOutlet", "RouterLink", "RouterLinkActive", "DashboardComponent"] {
            assert!(contains_word(shell, symbol), "shell lacks {symbol}");
        }
    }

    #[test]
    fn module_registration_is_idempotent() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle
            .components
            .insert("login-form".to_string(), component("login-form", "<form></form>"));
        bundle
            .services
            .insert("auth".to_string(), "export class AuthService {}".to_string());
        let project = materialize(&bundle, &legacy(true));
        assert!(!project.architecture.is_standalone());

        let mut tree = project.tree.clone();
        let mut warnings = Vec::new();
        register_in_module(&mut tree, &bundle, &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(tree, project.tree);

        let module = tree.read(paths::APP_MODULE).unwrap_or_default();
        assert_eq!(module.matches("LoginFormComponent").count(), 2);
        assert!(module.contains("providers: [AuthService]"));
        assert!(module.contains("import { AuthService } from './services/auth.service';"));

        let login = tree
            .read("src/app/components/login-form/login-form.component.ts")
            .unwrap_or_default();
        assert!(!login.contains("standalone"));
        assert!(login.contains("styleUrls: ['./login-form.component.scss']"));
    }

    #[test]
    fn module_based_strips_standalone_markers() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle.components.insert(
            "card".to_string(),
            ComponentArtifact {
                source: Some(
                    "import { Component } from '@angular/core';\n\n@Component({\n  selector: 'card',\n  standalone: true,\n  imports: [CommonModule],\n  template: '<p>card</p>'\n})\nexport class CardComponent { }\n"
                        .to_string(),
                ),
                ..ComponentArtifact::default()
            },
        );
        let project = materialize(&bundle, &legacy(false));
        let card = project
            .tree
            .read("src/app/components/card/card.component.ts")
            .unwrap_or_default();
        assert!(!card.contains("standalone"));
        assert!(!card.contains("imports:"));
        assert!(card.contains("template: '<p>card</p>'"));
    }

    #[test]
    fn standalone_routes_convert_into_routing_module() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle
            .components
            .insert("home".to_string(), component("home", "<p>home</p>"));
        bundle.routing = Some(
            "import { Routes } from '@angular/router';\n\nexport const routes: Routes = [\n  { path: 'home', component: HomeComponent }\n];\n"
                .to_string(),
        );
        let project = materialize(&bundle, &legacy(true));
        let tree = &project.tree;

        assert!(!tree.contains(paths::ROUTES));
        let module = tree.read(paths::ROUTING_MODULE).unwrap_or_default();
        assert!(module.contains("RouterModule.forRoot(routes)"));
        assert!(module.contains("export class AppRoutingModule"));
        assert!(module.contains("{ path: 'home', component: HomeComponent }"));
        assert!(module.contains("import { HomeComponent } from './components/home/home.component';"));
    }

    #[test]
    fn routing_module_converts_into_routes_file() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle
            .components
            .insert("home".to_string(), component("home", "<p>home</p>"));
        bundle.routing = Some(
            "@NgModule({\n  imports: [RouterModule.forRoot([{ path: 'home', component: HomeComponent }])],\n  exports: [RouterModule]\n})\nexport class AppRoutingModule { }\n"
                .to_string(),
        );
        let project = materialize(&bundle, &modern(true));
        let routes = project.tree.read(paths::ROUTES).unwrap_or_default();
        assert!(routes.contains("export const routes: Routes = [{ path: 'home', component: HomeComponent }];"));
        assert!(!project.tree.contains(paths::ROUTING_MODULE));
    }

    #[test]
    fn unusable_routing_warns_and_falls_back() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle
            .components
            .insert("home".to_string(), component("home", "<p>home</p>"));
        bundle.routing = Some("// routes go here".to_string());
        let project = materialize(&bundle, &modern(true));

        assert_eq!(project.warnings.len(), 1);
        assert_eq!(project.warnings[0].file, paths::ROUTES);
        let routes = project.tree.read(paths::ROUTES).unwrap_or_default();
        assert!(routes.contains("redirectTo: 'home'"));
    }

    #[test]
    fn standalone_shell_on_legacy_version_switches_bootstrap() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle.app_shell = Some(ComponentArtifact {
            source: Some(
                "import { Component } from '@angular/core';\n\n@Component({\n  selector: 'app-root',\n  standalone: true,\n  templateUrl: './app.component.html',\n  styleUrls: ['./app.component.scss']\n})\nexport class AppComponent { }\n"
                    .to_string(),
            ),
            template: Some("<h1>Custom</h1>".to_string()),
            style: None,
        });
        let project = materialize(&bundle, &legacy(true));
        let tree = &project.tree;

        assert!(project.architecture.is_standalone());
        assert_eq!(project.architecture.major(), 16);
        assert!(tree.contains(paths::APP_CONFIG));
        assert!(tree.contains(paths::ROUTES));
        assert!(!tree.contains(paths::APP_MODULE));
        assert!(!tree.contains(paths::ROUTING_MODULE));
        assert!(tree
            .read(paths::MAIN)
            .unwrap_or_default()
            .contains("bootstrapApplication(AppComponent, appConfig)"));
        assert_eq!(tree.read(paths::SHELL_TEMPLATE), Some("<h1>Custom</h1>"));
        let shell = tree.read(paths::SHELL_SOURCE).unwrap_or_default();
        assert!(shell.contains("imports: [CommonModule, RouterOutlet, RouterLink, RouterLinkActive]"));
        assert!(shell.contains("styleUrls: ['./app.component.scss']"));
    }

    #[test]
    fn adapting_twice_changes_nothing() {
        let mut bundle = GeneratedArtifactBundle::default();
        bundle
            .components
            .insert("login-form".to_string(), component("login-form", "<input [(ngModel)]=\"x\">"));
        let options = modern(true);
        let project = materialize(&bundle, &options);
        let mut again = project.tree.clone();
        adapt(&mut again, &bundle, &options, project.architecture, &mut Vec::new());
        assert_eq!(again, project.tree);
    }
}
