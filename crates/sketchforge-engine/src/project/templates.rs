//! Text of the files every generated project starts from.

use std::collections::HashSet;

use serde_json::{json, Value};
use sketchforge_contracts::naming::{nav_label, route_path};
use sketchforge_contracts::{FrameworkVersion, ProjectOptions, StylingAddOn};

pub const BOOTSTRAP_VERSION: &str = "^5.3.0";
const MATERIAL_PREBUILT_THEME: &str = "@angular/material/prebuilt-themes/indigo-pink.css";

/// `typescript` and `zone.js` ranges the framework major was released with.
pub fn toolchain_versions(major: u32) -> (&'static str, &'static str) {
    match major {
        0..=15 => ("~4.9.5", "~0.12.0"),
        16 => ("~5.1.3", "~0.13.0"),
        17 => ("~5.2.2", "~0.14.2"),
        _ => ("~5.4.2", "~0.14.3"),
    }
}

fn pretty(value: &Value) -> String {
    format!("{value:#}\n")
}

pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Single-quoted TypeScript string literal.
pub fn ts_string(raw: &str) -> String {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

pub fn package_json(options: &ProjectOptions, version: FrameworkVersion) -> String {
    let caret = format!("^{version}.0");
    let tilde = format!("~{version}.0");
    let (typescript, zone) = toolchain_versions(version.major);

    let mut dependencies = serde_json::Map::new();
    for package in [
        "animations",
        "common",
        "compiler",
        "core",
        "forms",
        "platform-browser",
        "platform-browser-dynamic",
        "router",
    ] {
        dependencies.insert(format!("@angular/{package}"), json!(caret));
    }
    dependencies.insert("rxjs".to_string(), json!("~7.8.0"));
    dependencies.insert("tslib".to_string(), json!("^2.3.0"));
    dependencies.insert("zone.js".to_string(), json!(zone));
    match options.css_framework {
        StylingAddOn::None => {}
        StylingAddOn::Bootstrap => {
            dependencies.insert("bootstrap".to_string(), json!(BOOTSTRAP_VERSION));
        }
        StylingAddOn::Material => {
            dependencies.insert("@angular/cdk".to_string(), json!(caret));
            dependencies.insert("@angular/material".to_string(), json!(caret));
        }
    }

    pretty(&json!({
        "name": options.project_slug(),
        "version": "0.0.0",
        "scripts": {
            "ng": "ng",
            "start": "ng serve",
            "build": "ng build",
            "watch": "ng build --watch --configuration development",
            "test": "ng test",
        },
        "private": true,
        "dependencies": dependencies,
        "devDependencies": {
            "@angular-devkit/build-angular": caret,
            "@angular/cli": tilde,
            "@angular/compiler-cli": caret,
            "@types/jasmine": "~5.1.0",
            "jasmine-core": "~5.1.0",
            "karma": "~6.4.0",
            "karma-chrome-launcher": "~3.2.0",
            "karma-coverage": "~2.2.0",
            "karma-jasmine": "~5.1.0",
            "karma-jasmine-html-reporter": "~2.1.0",
            "typescript": typescript,
        },
    }))
}

pub fn angular_json(options: &ProjectOptions, version: FrameworkVersion) -> String {
    let slug = options.project_slug();
    let ext = options.style_ext();
    let application_builder = version.defaults_to_standalone();

    let mut styles = vec![json!(format!("src/styles.{ext}"))];
    let mut scripts = Vec::new();
    match options.css_framework {
        StylingAddOn::None => {}
        StylingAddOn::Bootstrap => {
            styles.insert(0, json!("node_modules/bootstrap/dist/css/bootstrap.min.css"));
            scripts.push(json!("node_modules/bootstrap/dist/js/bootstrap.bundle.min.js"));
        }
        StylingAddOn::Material => styles.insert(0, json!(MATERIAL_PREBUILT_THEME)),
    }

    let mut build_options = json!({
        "outputPath": format!("dist/{slug}"),
        "index": "src/index.html",
        "polyfills": ["zone.js"],
        "tsConfig": "tsconfig.app.json",
        "inlineStyleLanguage": ext,
        "assets": ["src/assets"],
        "styles": styles,
        "scripts": scripts,
    });
    let (builder, entry_key, target_key) = if application_builder {
        ("@angular-devkit/build-angular:application", "browser", "buildTarget")
    } else {
        ("@angular-devkit/build-angular:browser", "main", "browserTarget")
    };
    build_options[entry_key] = json!("src/main.ts");

    pretty(&json!({
        "$schema": "./node_modules/@angular/cli/lib/config/schema.json",
        "version": 1,
        "newProjectRoot": "projects",
        "projects": {
            slug.clone(): {
                "projectType": "application",
                "schematics": {
                    "@schematics/angular:component": { "style": ext },
                },
                "root": "",
                "sourceRoot": "src",
                "prefix": "app",
                "architect": {
                    "build": {
                        "builder": builder,
                        "options": build_options,
                        "configurations": {
                            "production": {
                                "outputHashing": "all",
                                "fileReplacements": [{
                                    "replace": "src/environments/environment.ts",
                                    "with": "src/environments/environment.prod.ts",
                                }],
                            },
                            "development": {
                                "optimization": false,
                                "extractLicenses": false,
                                "sourceMap": true,
                            },
                        },
                        "defaultConfiguration": "production",
                    },
                    "serve": {
                        "builder": "@angular-devkit/build-angular:dev-server",
                        "configurations": {
                            "production": { target_key: format!("{slug}:build:production") },
                            "development": { target_key: format!("{slug}:build:development") },
                        },
                        "defaultConfiguration": "development",
                    },
                    "test": {
                        "builder": "@angular-devkit/build-angular:karma",
                        "options": {
                            "polyfills": ["zone.js", "zone.js/testing"],
                            "tsConfig": "tsconfig.spec.json",
                            "inlineStyleLanguage": ext,
                            "assets": ["src/assets"],
                            "styles": [format!("src/styles.{ext}")],
                        },
                    },
                },
            },
        },
    }))
}

pub fn tsconfig_json() -> String {
    pretty(&json!({
        "compileOnSave": false,
        "compilerOptions": {
            "baseUrl": "./",
            "outDir": "./dist/out-tsc",
            "forceConsistentCasingInFileNames": true,
            "strict": true,
            "noImplicitOverride": true,
            "noPropertyAccessFromIndexSignature": true,
            "noImplicitReturns": true,
            "noFallthroughCasesInSwitch": true,
            "skipLibCheck": true,
            "sourceMap": true,
            "declaration": false,
            "downlevelIteration": true,
            "experimentalDecorators": true,
            "moduleResolution": "node",
            "importHelpers": true,
            "target": "ES2022",
            "module": "ES2022",
            "useDefineForClassFields": false,
            "lib": ["ES2022", "dom"],
        },
        "angularCompilerOptions": {
            "enableI18nLegacyMessageIdFormat": false,
            "strictInjectionParameters": true,
            "strictInputAccessModifiers": true,
            "strictTemplates": true,
        },
    }))
}

pub fn tsconfig_app_json() -> String {
    pretty(&json!({
        "extends": "./tsconfig.json",
        "compilerOptions": {
            "outDir": "./out-tsc/app",
            "types": [],
        },
        "files": ["src/main.ts"],
        "include": ["src/**/*.d.ts"],
    }))
}

pub fn tsconfig_spec_json() -> String {
    pretty(&json!({
        "extends": "./tsconfig.json",
        "compilerOptions": {
            "outDir": "./out-tsc/spec",
            "types": ["jasmine"],
        },
        "include": ["src/**/*.spec.ts", "src/**/*.d.ts"],
    }))
}

pub fn readme(options: &ProjectOptions, version: FrameworkVersion) -> String {
    let style = match options.css_framework {
        StylingAddOn::None => "no styling add-on",
        StylingAddOn::Bootstrap => "Bootstrap",
        StylingAddOn::Material => "Angular Material",
    };
    format!(
        "# {name}\n\nAngular {version} project generated from a sketch ({style}).\n\n\
         ## Development server\n\nRun `npm install`, then `npm start` and open `http://localhost:4200/`.\n\n\
         ## Build\n\nRun `npm run build`; artifacts are written to `dist/{slug}`.\n",
        name = options.display_name(),
        slug = options.project_slug(),
    )
}

pub fn index_html(options: &ProjectOptions) -> String {
    let (fonts, body_class) = match options.css_framework {
        StylingAddOn::Material => (
            "  <link rel=\"preconnect\" href=\"https://fonts.gstatic.com\">\n  <link href=\"https://fonts.googleapis.com/css2?family=Roboto:wght@300;400;500&display=swap\" rel=\"stylesheet\">\n  <link href=\"https://fonts.googleapis.com/icon?family=Material+Icons\" rel=\"stylesheet\">\n",
            " class=\"mat-typography\"",
        ),
        _ => ("", ""),
    };
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  <title>{title}</title>\n  <base href=\"/\">\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n{fonts}</head>\n<body{body_class}>\n  <app-root></app-root>\n</body>\n</html>\n",
        title = html_escape(options.display_name()),
    )
}

pub fn main_ts_module() -> String {
    "import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';\n\n\
     import { AppModule } from './app/app.module';\n\n\
     platformBrowserDynamic().bootstrapModule(AppModule)\n  .catch(err => console.error(err));\n"
        .to_string()
}

pub fn main_ts_standalone() -> String {
    "import { bootstrapApplication } from '@angular/platform-browser';\n\n\
     import { appConfig } from './app/app.config';\n\
     import { AppComponent } from './app/app.component';\n\n\
     bootstrapApplication(AppComponent, appConfig)\n  .catch(err => console.error(err));\n"
        .to_string()
}

pub fn global_styles(options: &ProjectOptions) -> String {
    let mut styles = String::new();
    if options.css_framework == StylingAddOn::Material && options.style_ext() == "scss" {
        styles.push_str("@use '@angular/material' as mat;\n\n@include mat.core();\n\n");
    }
    styles.push_str(
        "/* Global styles. */\nhtml, body {\n  margin: 0;\n  padding: 0;\n  height: 100%;\n}\n\n\
         body {\n  font-family: Roboto, \"Helvetica Neue\", Arial, sans-serif;\n}\n\n\
         * {\n  box-sizing: border-box;\n}\n",
    );
    styles
}

pub fn environment(production: bool) -> String {
    format!("export const environment = {{\n  production: {production},\n  apiUrl: '/api',\n}};\n")
}

pub fn shell_component_source(
    options: &ProjectOptions,
    standalone: bool,
    singular_style_url: bool,
) -> String {
    let style_ref = if singular_style_url {
        format!("styleUrl: './app.component.{}'", options.style_ext())
    } else {
        format!("styleUrls: ['./app.component.{}']", options.style_ext())
    };
    let title = ts_string(options.display_name());
    if standalone {
        format!(
            "import {{ Component }} from '@angular/core';\nimport {{ CommonModule }} from '@angular/common';\nimport {{ RouterOutlet }} from '@angular/router';\n\n\
             @Component({{\n  selector: 'app-root',\n  standalone: true,\n  imports: [CommonModule, RouterOutlet],\n  templateUrl: './app.component.html',\n  {style_ref}\n}})\n\
             export class AppComponent {{\n  title = {title};\n}}\n"
        )
    } else {
        format!(
            "import {{ Component }} from '@angular/core';\n\n\
             @Component({{\n  selector: 'app-root',\n  templateUrl: './app.component.html',\n  {style_ref}\n}})\n\
             export class AppComponent {{\n  title = {title};\n}}\n"
        )
    }
}

/// Header, optional navigation, content region, footer.
///
/// The content region holds `<router-outlet>` when routing is on, inline
/// component tags when it is off, and a welcome note without components.
pub fn shell_template(display_name: &str, include_routing: bool, components: &[String]) -> String {
    let mut html = String::new();
    html.push_str("<div class=\"app-container\">\n");
    html.push_str(&format!(
        "  <header class=\"app-header\">\n    <h1>{}</h1>\n",
        html_escape(display_name)
    ));
    if include_routing && !components.is_empty() {
        html.push_str("    <nav class=\"app-nav\">\n      <ul>\n");
        let mut linked = HashSet::new();
        for name in components {
            let path = route_path(name);
            if !linked.insert(path.clone()) {
                continue;
            }
            html.push_str(&format!(
                "        <li><a routerLink=\"/{path}\" routerLinkActive=\"active\">{label}</a></li>\n",
                label = html_escape(&nav_label(name)),
            ));
        }
        html.push_str("      </ul>\n    </nav>\n");
    }
    html.push_str("  </header>\n\n  <main class=\"app-content\">\n");
    if include_routing {
        html.push_str("    <router-outlet></router-outlet>\n");
    } else if !components.is_empty() {
        for name in components {
            html.push_str(&format!("    <{name}></{name}>\n"));
        }
    } else {
        html.push_str(
            "    <section class=\"welcome\">\n      <h2>Welcome</h2>\n      <p>Your project is ready. Add components to get started.</p>\n    </section>\n",
        );
    }
    html.push_str(
        "  </main>\n\n  <footer class=\"app-footer\">\n    <p>Generated from a sketch</p>\n  </footer>\n</div>\n",
    );
    html
}

pub fn shell_styles() -> String {
    ".app-container {\n  display: flex;\n  flex-direction: column;\n  min-height: 100vh;\n}\n\n\
     .app-header {\n  background-color: #333;\n  color: #fff;\n  padding: 1rem;\n  text-align: center;\n}\n\n\
     .app-nav ul {\n  display: flex;\n  justify-content: center;\n  gap: 1rem;\n  list-style: none;\n  margin: 0.5rem 0 0;\n  padding: 0;\n}\n\n\
     .app-nav a {\n  color: #fff;\n  text-decoration: none;\n}\n\n\
     .app-nav a.active {\n  border-bottom: 2px solid #fff;\n}\n\n\
     .app-content {\n  flex: 1;\n  padding: 1rem;\n}\n\n\
     .app-footer {\n  background-color: #f5f5f5;\n  padding: 1rem;\n  text-align: center;\n  font-size: 0.875rem;\n}\n"
        .to_string()
}

const MATERIAL_MODULES: [(&str, &str); 4] = [
    ("MatButtonModule", "@angular/material/button"),
    ("MatCardModule", "@angular/material/card"),
    ("MatInputModule", "@angular/material/input"),
    ("MatToolbarModule", "@angular/material/toolbar"),
];

pub fn app_module(options: &ProjectOptions) -> String {
    let mut imports = vec![
        "import { NgModule } from '@angular/core';".to_string(),
        "import { BrowserModule } from '@angular/platform-browser';".to_string(),
        "import { HttpClientModule } from '@angular/common/http';".to_string(),
        "import { FormsModule, ReactiveFormsModule } from '@angular/forms';".to_string(),
    ];
    let mut module_imports = vec![
        "BrowserModule",
        "HttpClientModule",
        "FormsModule",
        "ReactiveFormsModule",
    ];
    if options.css_framework == StylingAddOn::Material {
        imports.push(
            "import { BrowserAnimationsModule } from '@angular/platform-browser/animations';"
                .to_string(),
        );
        module_imports.push("BrowserAnimationsModule");
        for (symbol, path) in MATERIAL_MODULES {
            imports.push(format!("import {{ {symbol} }} from '{path}';"));
            module_imports.push(symbol);
        }
    }
    imports.push(String::new());
    if options.include_routing {
        imports.push("import { AppRoutingModule } from './app-routing.module';".to_string());
        module_imports.push("AppRoutingModule");
    }
    imports.push("import { AppComponent } from './app.component';".to_string());

    format!(
        "{}\n\n@NgModule({{\n  declarations: [\n    AppComponent\n  ],\n  imports: [\n    {}\n  ],\n  providers: [],\n  bootstrap: [AppComponent]\n}})\nexport class AppModule {{ }}\n",
        imports.join("\n"),
        module_imports.join(",\n    ")
    )
}

pub fn app_config(options: &ProjectOptions) -> String {
    let mut imports = vec![
        "import { ApplicationConfig } from '@angular/core';".to_string(),
        "import { provideHttpClient } from '@angular/common/http';".to_string(),
    ];
    let mut providers = Vec::new();
    if options.include_routing {
        imports.push("import { provideRouter } from '@angular/router';".to_string());
        providers.push("provideRouter(routes)");
    }
    providers.push("provideHttpClient()");
    if options.css_framework == StylingAddOn::Material {
        imports.push(
            "import { provideAnimations } from '@angular/platform-browser/animations';".to_string(),
        );
        providers.push("provideAnimations()");
    }
    if options.include_routing {
        imports.push(String::new());
        imports.push("import { routes } from './app.routes';".to_string());
    }
    format!(
        "{}\n\nexport const appConfig: ApplicationConfig = {{\n  providers: [{}]\n}};\n",
        imports.join("\n"),
        providers.join(", ")
    )
}

/// `(symbol, module path)` import lines, one per entry.
fn import_lines(imports: &[(String, String)]) -> String {
    imports
        .iter()
        .map(|(symbol, path)| format!("import {{ {symbol} }} from '{path}';\n"))
        .collect()
}

/// Standalone routing: a bare exported route list.
pub fn routes_file(route_list: &str, imports: &[(String, String)]) -> String {
    let components = import_lines(imports);
    let spacer = if components.is_empty() { "" } else { "\n" };
    format!(
        "import {{ Routes }} from '@angular/router';\n{spacer}{components}\nexport const routes: Routes = {route_list};\n"
    )
}

/// Module-based routing: the same list wrapped in a routing module.
pub fn routing_module(route_list: &str, imports: &[(String, String)]) -> String {
    let components = import_lines(imports);
    let spacer = if components.is_empty() { "" } else { "\n" };
    format!(
        "import {{ NgModule }} from '@angular/core';\nimport {{ RouterModule, Routes }} from '@angular/router';\n{spacer}{components}\n\
         const routes: Routes = {route_list};\n\n\
         @NgModule({{\n  imports: [RouterModule.forRoot(routes)],\n  exports: [RouterModule]\n}})\n\
         export class AppRoutingModule {{ }}\n"
    )
}

/// Minimal class for a component that arrived without TypeScript.
pub fn component_stub(name: &str, symbol: &str, has_template: bool, style_ext: &str) -> String {
    let template = if has_template {
        format!("templateUrl: './{name}.component.html'")
    } else {
        format!("template: '<p>{name} works!</p>'")
    };
    format!(
        "import {{ Component }} from '@angular/core';\n\n@Component({{\n  selector: '{name}',\n  {template},\n  styleUrls: ['./{name}.component.{style_ext}']\n}})\nexport class {symbol} {{ }}\n"
    )
}

#[cfg(test)]
mod tests {
    use sketchforge_contracts::StyleLanguage;

    use super::*;

    fn version(major: u32, minor: u32) -> FrameworkVersion {
        FrameworkVersion { major, minor }
    }

    #[test]
    fn package_json_pins_framework_and_add_ons() -> anyhow::Result<()> {
        let options = ProjectOptions {
            name: "Shop Admin".to_string(),
            css_framework: StylingAddOn::Material,
            ..ProjectOptions::default()
        };
        let manifest: Value = serde_json::from_str(&package_json(&options, version(16, 2)))?;
        assert_eq!(manifest["name"], "shop-admin");
        assert_eq!(manifest["dependencies"]["@angular/core"], "^16.2.0");
        assert_eq!(manifest["dependencies"]["@angular/material"], "^16.2.0");
        assert_eq!(manifest["dependencies"]["zone.js"], "~0.13.0");
        assert_eq!(manifest["devDependencies"]["typescript"], "~5.1.3");
        assert_eq!(manifest["devDependencies"]["@angular/cli"], "~16.2.0");
        assert!(manifest["dependencies"].get("bootstrap").is_none());
        Ok(())
    }

    #[test]
    fn angular_json_builder_follows_version() -> anyhow::Result<()> {
        let options = ProjectOptions {
            css_framework: StylingAddOn::Bootstrap,
            style_language: StyleLanguage::Css,
            ..ProjectOptions::default()
        };
        let modern: Value = serde_json::from_str(&angular_json(&options, version(17, 3)))?;
        let build = &modern["projects"]["sketch-app"]["architect"]["build"];
        assert_eq!(build["builder"], "@angular-devkit/build-angular:application");
        assert_eq!(build["options"]["browser"], "src/main.ts");
        assert_eq!(build["options"]["styles"][1], "src/styles.css");
        assert_eq!(
            build["options"]["scripts"][0],
            "node_modules/bootstrap/dist/js/bootstrap.bundle.min.js"
        );

        let legacy: Value = serde_json::from_str(&angular_json(&options, version(15, 2)))?;
        let architect = &legacy["projects"]["sketch-app"]["architect"];
        assert_eq!(architect["build"]["builder"], "@angular-devkit/build-angular:browser");
        assert_eq!(architect["build"]["options"]["main"], "src/main.ts");
        assert_eq!(
            architect["serve"]["configurations"]["development"]["browserTarget"],
            "sketch-app:build:development"
        );
        Ok(())
    }

    #[test]
    fn shell_template_content_region() {
        let components = vec!["app-dashboard".to_string(), "app-user-profile".to_string()];
        let routed = shell_template("A <b> & C", true, &components);
        assert!(routed.contains("<h1>A &lt;b&gt; &amp; C</h1>"));
        assert!(routed.contains("routerLink=\"/user-profile\""));
        assert!(routed.contains(">User Profile</a>"));
        assert!(routed.contains("<router-outlet></router-outlet>"));

        let inline = shell_template("X", false, &["login-form".to_string()]);
        assert!(inline.contains("<login-form></login-form>"));
        assert!(!inline.contains("<nav"));

        let empty = shell_template("X", false, &[]);
        assert!(empty.contains("Welcome"));
    }

    #[test]
    fn app_config_wires_router_only_with_routing() {
        let routed = app_config(&ProjectOptions::default());
        assert!(routed.contains("provideRouter(routes)"));
        assert!(routed.contains("import { routes } from './app.routes';"));

        let plain = app_config(&ProjectOptions {
            include_routing: false,
            ..ProjectOptions::default()
        });
        assert!(!plain.contains("provideRouter"));
        assert!(plain.contains("providers: [provideHttpClient()]"));
    }

    #[test]
    fn string_helpers_escape() {
        assert_eq!(ts_string("Bob's app"), "'Bob\\'s app'");
        assert_eq!(html_escape("{{ x }}"), "&#123;&#123; x &#125;&#125;");
    }
}
