//! Sketch import: submission, one background worker per task, status polls.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use sketchforge_contracts::tasks::{ImportResult, ImportTask, TaskStatus, TaskStore, TaskUpdate};
use sketchforge_contracts::{EventWriter, ShapeElement};
use uuid::Uuid;

use crate::client::VisionModel;
use crate::config::EngineConfig;
use crate::error::{SketchError, SketchResult};
use crate::extraction::ExtractionController;
use crate::journal;
use crate::preview::write_preview;

pub const MAX_SKETCH_BYTES: u64 = 5 * 1024 * 1024;
pub const SKETCH_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a status poll returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum TaskView {
    InProgress { status: TaskStatus, progress: u8 },
    Failed { error: String },
    Completed { elements: Vec<ShapeElement>, preview: String },
}

impl TaskView {
    fn from_task(task: ImportTask) -> Self {
        match (task.status, task.result) {
            (TaskStatus::Completed, Some(result)) => Self::Completed {
                elements: result.elements,
                preview: result.preview,
            },
            (TaskStatus::Completed, None) => Self::Failed {
                error: "task completed without a result".to_string(),
            },
            (TaskStatus::Failed, _) => Self::Failed {
                error: task.error.unwrap_or_else(|| "import failed".to_string()),
            },
            (status, _) => Self::InProgress {
                status,
                progress: status.progress().unwrap_or_default(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

struct ServiceInner {
    store: Arc<dyn TaskStore>,
    model: Arc<dyn VisionModel>,
    config: EngineConfig,
    /// Previews are written below this directory.
    data_dir: PathBuf,
    events: EventWriter,
}

#[derive(Clone)]
pub struct ImportService {
    inner: Arc<ServiceInner>,
}

impl ImportService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        model: Arc<dyn VisionModel>,
        config: EngineConfig,
        data_dir: impl Into<PathBuf>,
        events: EventWriter,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                store,
                model,
                config,
                data_dir: data_dir.into(),
                events,
            }),
        }
    }

    /// Validates the sketch, records a `pending` task and starts its worker.
    pub fn submit(&self, sketch: &Path, user_id: &str) -> SketchResult<String> {
        validate_sketch(sketch)?;
        let task_id = Uuid::new_v4().to_string();
        let task = ImportTask::pending(&task_id, user_id, sketch.display().to_string());
        self.inner.store.put(task).map_err(SketchError::TaskStore)?;
        journal(
            &self.inner.events,
            "task_transition",
            json!({"task_id": task_id, "from": null, "to": TaskStatus::Pending.as_str()}),
        );
        tracing::info!(task_id = %task_id, user_id, "sketch import queued");

        let inner = Arc::clone(&self.inner);
        let worker_id = task_id.clone();
        let sketch = sketch.to_path_buf();
        thread::Builder::new()
            .name(format!("import-{task_id}"))
            .spawn(move || run_import(&inner, &worker_id, &sketch))
            .map_err(|err| {
                SketchError::TaskStore(anyhow::Error::new(err).context("failed to start import worker"))
            })?;
        Ok(task_id)
    }

    pub fn status(&self, task_id: &str) -> SketchResult<TaskView> {
        let task = self
            .inner
            .store
            .get(task_id)
            .map_err(SketchError::TaskStore)?
            .ok_or_else(|| SketchError::TaskNotFound(task_id.to_string()))?;
        Ok(TaskView::from_task(task))
    }

    /// Polls until the task is terminal or `timeout` passes; the last view
    /// is returned either way.
    pub fn wait_for_terminal(&self, task_id: &str, timeout: Duration) -> SketchResult<TaskView> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self.status(task_id)?;
            if view.is_terminal() || Instant::now() >= deadline {
                return Ok(view);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

pub fn validate_sketch(path: &Path) -> SketchResult<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SKETCH_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SketchError::InvalidInput(format!(
            "unsupported sketch type '{extension}' (expected one of: {})",
            SKETCH_EXTENSIONS.join(", ")
        )));
    }
    let metadata = fs::metadata(path).map_err(|_| {
        SketchError::InvalidInput(format!("sketch file not found: {}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(SketchError::InvalidInput(format!(
            "sketch is not a file: {}",
            path.display()
        )));
    }
    if metadata.len() > MAX_SKETCH_BYTES {
        return Err(SketchError::InvalidInput(format!(
            "sketch is {} bytes; the limit is {MAX_SKETCH_BYTES}",
            metadata.len()
        )));
    }
    Ok(())
}

pub fn preview_reference(task_id: &str) -> String {
    format!("previews/preview-{task_id}.png")
}

/// `Ok(false)` when the task was not in `from`; `Err` when the store could
/// not record the update, in which case the task keeps its old status.
fn transition(
    inner: &ServiceInner,
    task_id: &str,
    from: TaskStatus,
    update: TaskUpdate,
) -> anyhow::Result<bool> {
    let to = update.status();
    match inner.store.compare_and_swap_status(task_id, from, update) {
        Ok(true) => {
            journal(
                &inner.events,
                "task_transition",
                json!({"task_id": task_id, "from": from.as_str(), "to": to.as_str()}),
            );
            Ok(true)
        }
        Ok(false) => {
            tracing::warn!(task_id, from = from.as_str(), to = to.as_str(), "task was not in the expected state");
            Ok(false)
        }
        Err(err) => {
            tracing::error!(task_id, to = to.as_str(), error = %format!("{err:#}"), "task store update failed");
            Err(err)
        }
    }
}

fn run_import(inner: &ServiceInner, task_id: &str, sketch: &Path) {
    if !matches!(transition(inner, task_id, TaskStatus::Pending, TaskUpdate::Processing), Ok(true)) {
        return;
    }

    // A panicking worker must still leave the task terminal.
    let update = panic::catch_unwind(AssertUnwindSafe(|| interpret(inner, task_id, sketch)))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(task_id, panic = %message, "import worker panicked");
            TaskUpdate::Failed(format!("import worker panicked: {message}"))
        });
    let completed = matches!(update, TaskUpdate::Completed(_));
    if let Err(err) = transition(inner, task_id, TaskStatus::Processing, update) {
        if completed {
            let reason = format!("import result could not be stored: {err:#}");
            let _ = transition(inner, task_id, TaskStatus::Processing, TaskUpdate::Failed(reason));
        }
    }
}

fn interpret(inner: &ServiceInner, task_id: &str, sketch: &Path) -> TaskUpdate {
    let image = fs::read(sketch).unwrap_or_else(|err| {
        tracing::warn!(task_id, path = %sketch.display(), error = %err, "sketch unreadable; extracting from an empty image");
        Vec::new()
    });
    let controller = ExtractionController::new(
        Arc::clone(&inner.model),
        &inner.config,
        inner.events.for_run(task_id),
    );
    let extraction = controller.extract(&image);

    let preview = preview_reference(task_id);
    match write_preview(&extraction.elements, &inner.data_dir.join(&preview)) {
        Ok(()) => TaskUpdate::Completed(ImportResult {
            elements: extraction.elements,
            preview,
        }),
        Err(err) => {
            tracing::error!(task_id, error = %err, "preview could not be written");
            TaskUpdate::Failed(err.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
