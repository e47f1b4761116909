//! Sketch interpretation and project generation.
//!
//! Two pipelines share one generative client: [`ExtractionController`] turns
//! a sketch into shape elements, and [`ProjectExporter`] turns a canvas
//! snapshot into a packed project archive.

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod export;
pub mod extraction;
pub mod imports;
pub mod packager;
pub mod preview;
pub mod project;
pub mod prompts;
pub mod synthesis;

pub use client::{default_registry, ModelCall, VisionModel, VisionModelRegistry};
pub use config::EngineConfig;
pub use error::{AdaptationWarning, SketchError, SketchResult};
pub use export::{CanvasImage, ExportOutcome, ExportRequest, ProjectExporter};
pub use extraction::{Extraction, ExtractionController};
pub use imports::{ImportService, TaskView};
pub use packager::Packager;
pub use project::{ArchitectureKind, ProjectArchitecture, ProjectTree};
pub use synthesis::SynthesisRequestor;

use serde_json::{Map, Value};
use sketchforge_contracts::EventWriter;

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Journal failures never abort a pipeline; they are logged and dropped.
pub(crate) fn journal(events: &EventWriter, event_type: &str, payload: Value) {
    if let Err(err) = events.emit(event_type, map_object(payload)) {
        tracing::warn!(event = event_type, error = %err, "failed to journal event");
    }
}
