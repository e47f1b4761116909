mod store;

pub use store::{MemoryTaskStore, MirroredTaskStore, TaskArchive, TaskStore, TaskUpdate};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::elements::ShapeElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Coarse progress shown to status pollers while a task is in flight.
    pub fn progress(self) -> Option<u8> {
        match self {
            Self::Pending => Some(10),
            Self::Processing => Some(50),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub elements: Vec<ShapeElement>,
    /// Reference to the rendered preview, relative to the service data dir.
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTask {
    pub id: String,
    pub user_id: String,
    pub file_path: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<ImportResult>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ImportTask {
    pub fn pending(
        id: impl Into<String>,
        user_id: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let now = now_utc_iso();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            file_path: file_path.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub(crate) fn apply(&mut self, update: TaskUpdate) {
        match update {
            TaskUpdate::Processing => self.status = TaskStatus::Processing,
            TaskUpdate::Completed(result) => {
                self.status = TaskStatus::Completed;
                self.result = Some(result);
                self.error = None;
            }
            TaskUpdate::Failed(error) => {
                self.status = TaskStatus::Failed;
                self.error = Some(error);
            }
        }
        self.updated_at = now_utc_iso();
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
