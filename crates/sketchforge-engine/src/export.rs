//! Full project from a canvas snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use sketchforge_contracts::{EventWriter, ProjectOptions};

use crate::client::{decode_image_payload, VisionModel};
use crate::config::EngineConfig;
use crate::error::{AdaptationWarning, SketchError, SketchResult};
use crate::journal;
use crate::packager::Packager;
use crate::project::{materialize, MaterializedProject, ProjectArchitecture};
use crate::synthesis::SynthesisRequestor;

/// A canvas snapshot as raw bytes or base64 (a `data:` URI prefix is fine).
#[derive(Debug, Clone)]
pub enum CanvasImage {
    Bytes(Vec<u8>),
    Base64(String),
}

impl CanvasImage {
    pub fn into_bytes(self) -> SketchResult<Vec<u8>> {
        let bytes = match self {
            Self::Bytes(bytes) => bytes,
            Self::Base64(encoded) => decode_image_payload(&encoded)?,
        };
        if bytes.is_empty() {
            return Err(SketchError::InvalidInput("canvas image is empty".to_string()));
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub canvas: Option<CanvasImage>,
    pub options: ProjectOptions,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub archive: Vec<u8>,
    pub sha256: String,
    pub architecture: ProjectArchitecture,
    pub warnings: Vec<AdaptationWarning>,
    /// Top-level directory inside the archive.
    pub project_root: String,
}

pub struct ProjectExporter {
    model: Arc<dyn VisionModel>,
    config: EngineConfig,
    staging_parent: PathBuf,
    events: EventWriter,
}

impl ProjectExporter {
    pub fn new(model: Arc<dyn VisionModel>, config: EngineConfig, events: EventWriter) -> Self {
        Self {
            model,
            config,
            staging_parent: std::env::temp_dir(),
            events,
        }
    }

    pub fn with_staging_parent(mut self, staging_parent: impl Into<PathBuf>) -> Self {
        self.staging_parent = staging_parent.into();
        self
    }

    /// synthesize → skeleton → merge → detect → adapt → stage → pack.
    ///
    /// Upstream and decode failures end the run before anything is staged.
    pub fn export(&self, request: ExportRequest) -> SketchResult<ExportOutcome> {
        let ExportRequest { canvas, options } = request;
        let image = canvas
            .ok_or_else(|| SketchError::InvalidInput("a canvas image is required".to_string()))?
            .into_bytes()?;

        journal(
            &self.events,
            "run_started",
            json!({
                "pipeline": "export",
                "project": options.display_name(),
                "version": options.version,
                "include_routing": options.include_routing,
                "css_framework": options.css_framework,
                "style_language": options.style_language,
                "image_bytes": image.len(),
            }),
        );
        tracing::info!(project = options.display_name(), version = %options.version, "export started");

        let bundle = SynthesisRequestor::new(Arc::clone(&self.model), &self.config, self.events.clone())
            .synthesize(&image, &options)?;
        let MaterializedProject {
            tree,
            architecture,
            warnings,
        } = materialize(&bundle, &options);

        journal(
            &self.events,
            "architecture_detected",
            json!({
                "kind": architecture.kind,
                "major": architecture.major(),
            }),
        );
        for warning in &warnings {
            tracing::warn!(file = %warning.file, "{}", warning.message);
            journal(
                &self.events,
                "adaptation_warning",
                json!({"file": warning.file, "message": warning.message}),
            );
        }

        let packed = Packager::new(&self.staging_parent, self.events.clone()).package(&tree)?;
        Ok(ExportOutcome {
            archive: packed.bytes,
            sha256: packed.sha256,
            architecture,
            warnings,
            project_root: tree.root().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Cursor, Read};

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::Value;
    use sketchforge_contracts::StyleLanguage;
    use zip::ZipArchive;

    use super::*;
    use crate::client::testing::ScriptedModel;
    use crate::project::ArchitectureKind;

    const BUNDLE_REPLY: &str = r#"Here is the project:

```json
{
  "components": {
    "app-dashboard": {
      "ts": "import { Component } from '@angular/core';\n\n@Component({\n  selector: 'app-dashboard',\n  templateUrl: './app-dashboard.component.html',\n  styleUrls: ['./app-dashboard.component.scss']\n})\nexport class AppDashboardComponent { }\n",
      "html": "<h2>Dashboard</h2>"
    }
  },
  "services": {"metrics": "export class MetricsService {}"},
  "projectStructure": {"description": "Dashboard with one metrics service."}
}
```"#;

    fn exporter(model: ScriptedModel, temp: &std::path::Path) -> ProjectExporter {
        ProjectExporter::new(
            Arc::new(model),
            EngineConfig::default(),
            EventWriter::new(temp.join("events.jsonl"), "export-test"),
        )
        .with_staging_parent(temp.join("staging"))
    }

    fn read_entry(archive: &[u8], name: &str) -> anyhow::Result<String> {
        let mut zip = ZipArchive::new(Cursor::new(archive))?;
        let mut contents = String::new();
        zip.by_name(name)?.read_to_string(&mut contents)?;
        Ok(contents)
    }

    #[test]
    fn legacy_module_project_is_exported() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = exporter(ScriptedModel::replying(BUNDLE_REPLY), temp.path());
        let outcome = exporter.export(ExportRequest {
            canvas: Some(CanvasImage::Base64(format!(
                "data:image/png;base64,{}",
                BASE64.encode(b"canvas")
            ))),
            options: ProjectOptions {
                name: "Ops Console".to_string(),
                version: "16.2".to_string(),
                style_language: StyleLanguage::Css,
                ..ProjectOptions::default()
            },
        })?;

        assert_eq!(outcome.project_root, "ops-console");
        assert_eq!(outcome.architecture.kind, ArchitectureKind::ModuleBased);
        assert!(outcome.warnings.is_empty());

        let module = read_entry(&outcome.archive, "ops-console/src/app/app.module.ts")?;
        assert!(module.contains("AppDashboardComponent"));
        assert!(module.contains("providers: [MetricsService]"));
        let component = read_entry(
            &outcome.archive,
            "ops-console/src/app/components/app-dashboard/app-dashboard.component.ts",
        )?;
        assert!(component.contains("styleUrls: ['./app-dashboard.component.css']"));
        let routing = read_entry(&outcome.archive, "ops-console/src/app/app-routing.module.ts")?;
        assert!(routing.contains("{ path: 'dashboard', component: AppDashboardComponent }"));
        let readme = read_entry(&outcome.archive, "ops-console/README.md")?;
        assert!(readme.contains("Dashboard with one metrics service."));

        assert_eq!(fs::read_dir(temp.path().join("staging"))?.count(), 0);
        let events = fs::read_to_string(temp.path().join("events.jsonl"))?;
        let types: Vec<String> = events
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            types,
            ["run_started", "synthesis_completed", "architecture_detected", "archive_written"]
        );
        Ok(())
    }

    #[test]
    fn missing_canvas_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = exporter(ScriptedModel::replying(BUNDLE_REPLY), temp.path());
        let result = exporter.export(ExportRequest::default());
        assert!(matches!(result, Err(SketchError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn upstream_failure_produces_no_archive() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let model = ScriptedModel::new(vec![Err(SketchError::Upstream("status 503".to_string()))]);
        let exporter = exporter(model, temp.path());
        let result = exporter.export(ExportRequest {
            canvas: Some(CanvasImage::Bytes(b"canvas".to_vec())),
            options: ProjectOptions::default(),
        });
        assert!(matches!(result, Err(SketchError::Upstream(_))));
        assert!(!temp.path().join("staging").exists());
        Ok(())
    }

    #[test]
    fn undecodable_reply_is_a_decode_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = exporter(ScriptedModel::replying("I drew you a picture instead."), temp.path());
        let result = exporter.export(ExportRequest {
            canvas: Some(CanvasImage::Bytes(b"canvas".to_vec())),
            options: ProjectOptions::default(),
        });
        assert!(matches!(result, Err(SketchError::Decode(_))));
        Ok(())
    }
}
