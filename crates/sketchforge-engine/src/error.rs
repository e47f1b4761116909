use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SketchError {
    /// Transport failure or non-success reply from the generative model.
    #[error("upstream model request failed: {0}")]
    Upstream(String),

    /// No JSON object could be recovered from the model's text.
    #[error("could not decode model output: {0}")]
    Decode(String),

    #[error("model declined the request: {0}")]
    Refusal(String),

    #[error("model returned no usable elements")]
    EmptyResult,

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("import task {0} not found")]
    TaskNotFound(String),

    #[error("task store error: {0:#}")]
    TaskStore(anyhow::Error),
}

impl SketchError {
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Short machine-readable label used in journal events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream-error",
            Self::Decode(_) => "parse-error",
            Self::Refusal(_) => "refused",
            Self::EmptyResult => "empty",
            Self::Filesystem { .. } => "filesystem-error",
            Self::Archive(_) => "archive-error",
            Self::InvalidInput(_) => "invalid-input",
            Self::TaskNotFound(_) => "task-not-found",
            Self::TaskStore(_) => "task-store-error",
        }
    }
}

pub type SketchResult<T> = Result<T, SketchError>;

/// Non-fatal condition met while weaving generated code into the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptationWarning {
    /// Project-relative path of the file the skipped edit targeted.
    pub file: String,
    pub message: String,
}

impl AdaptationWarning {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AdaptationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}
