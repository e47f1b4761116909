use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sketchforge_contracts::tasks::{MirroredTaskStore, TaskArchive};
use sketchforge_contracts::{EventWriter, ProjectOptions, StyleLanguage, StylingAddOn};
use sketchforge_engine::{
    default_registry, CanvasImage, EngineConfig, ExportRequest, ExtractionController,
    ImportService, ProjectExporter, TaskView, VisionModel,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "sketchforge", version, about = "Sketches to canvas shapes or Angular projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interpret a sketch and print its shape elements.
    Elements(ElementsArgs),
    /// Submit a sketch import and wait for it to finish.
    Import(ImportArgs),
    /// Show a persisted import task.
    Status(StatusArgs),
    /// Generate a full project archive from a canvas snapshot.
    Export(ExportArgs),
}

#[derive(Debug, Parser)]
struct ModelArgs {
    /// Back end name (`openai` or `dryrun`).
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    /// Append run events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ElementsArgs {
    #[arg(long)]
    sketch: PathBuf,
    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Debug, Parser)]
struct ImportArgs {
    #[arg(long)]
    sketch: PathBuf,
    #[arg(long)]
    user: String,
    /// Task records and previews are written here.
    #[arg(long)]
    store: PathBuf,
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    #[arg(long)]
    task_id: String,
    #[arg(long)]
    store: PathBuf,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Canvas snapshot: an image file, or a text file holding base64.
    #[arg(long)]
    canvas: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    framework_version: Option<String>,
    #[arg(long)]
    routing: Option<bool>,
    #[arg(long)]
    css_framework: Option<String>,
    #[arg(long)]
    style_language: Option<String>,
    /// Project options as JSON; the flags above take precedence.
    #[arg(long)]
    options_json: Option<String>,
    #[command(flatten)]
    model: ModelArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sketchforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Elements(args) => run_elements(args),
        Command::Import(args) => run_import(args),
        Command::Status(args) => run_status(args),
        Command::Export(args) => run_export(args),
    }
}

fn engine_config(args: &ModelArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(provider) = &args.provider {
        config.provider = provider.trim().to_ascii_lowercase();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    config
}

fn resolve_model(config: &EngineConfig) -> Result<Arc<dyn VisionModel>> {
    let registry = default_registry(config)?;
    Ok(registry.resolve(config)?)
}

fn event_writer(args: &ModelArgs, run_id: &str) -> EventWriter {
    match &args.events {
        Some(path) => EventWriter::new(path, run_id),
        None => EventWriter::disabled(run_id),
    }
}

fn new_run_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_elements(args: ElementsArgs) -> Result<i32> {
    let config = engine_config(&args.model);
    let model = resolve_model(&config)?;
    let image = fs::read(&args.sketch)
        .with_context(|| format!("failed reading {}", args.sketch.display()))?;
    let events = event_writer(&args.model, &new_run_id("elements"));

    let extraction = ExtractionController::new(model, &config, events).extract(&image);
    if extraction.fell_back {
        eprintln!(
            "sketch could not be interpreted after {} attempts; printing placeholder elements",
            extraction.attempts.len()
        );
    }
    print_json(&extraction.elements)?;
    Ok(0)
}

fn task_service(
    store: &Path,
    model: Arc<dyn VisionModel>,
    config: EngineConfig,
    events: EventWriter,
) -> ImportService {
    ImportService::new(
        Arc::new(MirroredTaskStore::new(TaskArchive::new(store))),
        model,
        config,
        store,
        events,
    )
}

fn view_exit_code(view: &TaskView) -> i32 {
    match view {
        TaskView::Completed { .. } => 0,
        TaskView::Failed { .. } => 1,
        TaskView::InProgress { .. } => 2,
    }
}

fn run_import(args: ImportArgs) -> Result<i32> {
    let config = engine_config(&args.model);
    let model = resolve_model(&config)?;
    let events = event_writer(&args.model, &new_run_id("import"));
    let imports = task_service(&args.store, model, config, events);

    let task_id = imports.submit(&args.sketch, &args.user)?;
    eprintln!("task {task_id} submitted");
    let view = imports.wait_for_terminal(&task_id, Duration::from_secs(args.timeout_secs))?;
    print_json(&serde_json::json!({"taskId": task_id, "view": view}))?;
    Ok(view_exit_code(&view))
}

fn run_status(args: StatusArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let model = resolve_model(&config)?;
    let imports = task_service(&args.store, model, config, EventWriter::disabled("status"));
    let view = imports.status(&args.task_id)?;
    print_json(&view)?;
    Ok(view_exit_code(&view))
}

fn export_options(args: &ExportArgs) -> Result<ProjectOptions> {
    let mut options = match &args.options_json {
        Some(raw) => serde_json::from_str::<ProjectOptions>(raw).context("invalid --options-json")?,
        None => ProjectOptions::default(),
    };
    if let Some(name) = &args.name {
        options.name = name.clone();
    }
    if let Some(version) = &args.framework_version {
        options.version = version.clone();
    }
    if let Some(routing) = args.routing {
        options.include_routing = routing;
    }
    if let Some(raw) = &args.css_framework {
        options.css_framework = StylingAddOn::parse(raw)
            .ok_or_else(|| anyhow!("unknown css framework '{raw}' (none, bootstrap, material)"))?;
    }
    if let Some(raw) = &args.style_language {
        options.style_language = StyleLanguage::parse(raw)
            .ok_or_else(|| anyhow!("unknown style language '{raw}' (css, scss)"))?;
    }
    Ok(options)
}

/// Image files are passed through; anything that does not look like an
/// image is read as base64 text.
fn load_canvas(path: &Path) -> Result<CanvasImage> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("canvas file {} is empty", path.display());
    }
    if image_like(&bytes) {
        return Ok(CanvasImage::Bytes(bytes));
    }
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is neither an image nor base64 text", path.display()))?;
    Ok(CanvasImage::Base64(text))
}

fn image_like(bytes: &[u8]) -> bool {
    const SIGNATURES: [&[u8]; 4] = [b"\x89PNG", b"\xff\xd8\xff", b"GIF8", b"RIFF"];
    SIGNATURES.iter().any(|signature| bytes.starts_with(signature))
}

fn run_export(args: ExportArgs) -> Result<i32> {
    let options = export_options(&args)?;
    tracing::debug!(?options, "resolved project options");
    let config = engine_config(&args.model);
    let model = resolve_model(&config)?;
    let events = event_writer(&args.model, &new_run_id("export"));
    let canvas = load_canvas(&args.canvas)?;

    let outcome = ProjectExporter::new(model, config, events).export(ExportRequest {
        canvas: Some(canvas),
        options,
    })?;
    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    fs::write(&args.out, &outcome.archive)
        .with_context(|| format!("failed writing {}", args.out.display()))?;

    println!(
        "Exported {} ({} architecture, framework {}) to {}",
        outcome.project_root,
        outcome.architecture.label(),
        outcome.architecture.major(),
        args.out.display()
    );
    println!("sha256 {}", outcome.sha256);
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    Ok(0)
}
