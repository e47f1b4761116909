use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context};

use super::{ImportResult, ImportTask, TaskStatus};

/// Transition requested by the single worker that owns a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    Processing,
    Completed(ImportResult),
    Failed(String),
}

impl TaskUpdate {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Processing => TaskStatus::Processing,
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }
}

pub trait TaskStore: Send + Sync {
    /// Stores a new task. Fails if the id is already known.
    fn put(&self, task: ImportTask) -> anyhow::Result<()>;

    fn get(&self, id: &str) -> anyhow::Result<Option<ImportTask>>;

    /// Applies `update` only when the task's current status is `expected`.
    /// Returns `false` (and changes nothing) otherwise or for unknown ids.
    fn compare_and_swap_status(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> anyhow::Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, ImportTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, ImportTask>>> {
        self.tasks
            .lock()
            .map_err(|_| anyhow!("task store lock poisoned"))
    }

    /// CAS that runs `persist` on the updated record before committing it.
    /// When `persist` fails the stored task is left untouched.
    fn swap_with(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
        persist: impl FnOnce(&ImportTask) -> anyhow::Result<()>,
    ) -> anyhow::Result<bool> {
        let mut tasks = self.lock()?;
        let Some(task) = tasks.get_mut(id) else {
            return Ok(false);
        };
        if task.status != expected {
            return Ok(false);
        }
        let mut updated = task.clone();
        updated.apply(update);
        persist(&updated)?;
        *task = updated;
        Ok(true)
    }
}

impl TaskStore for MemoryTaskStore {
    fn put(&self, task: ImportTask) -> anyhow::Result<()> {
        let mut tasks = self.lock()?;
        if tasks.contains_key(&task.id) {
            bail!("task {} already exists", task.id);
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn get(&self, id: &str) -> anyhow::Result<Option<ImportTask>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn compare_and_swap_status(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> anyhow::Result<bool> {
        self.swap_with(id, expected, update, |_| Ok(()))
    }
}

/// Durable records for terminal tasks: one `<task-id>.json` per task.
#[derive(Debug, Clone)]
pub struct TaskArchive {
    dir: PathBuf,
}

impl TaskArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, id: &str) -> anyhow::Result<PathBuf> {
        if !is_safe_task_id(id) {
            bail!("invalid task id {id:?}");
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    pub fn write(&self, task: &ImportTask) -> anyhow::Result<()> {
        let path = self.record_path(&task.id)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed creating {}", self.dir.display()))?;
        // Write-then-rename so a reader never sees a half-written record.
        let staging = self.dir.join(format!(".{}.json.tmp", task.id));
        std::fs::write(&staging, serde_json::to_string_pretty(task)?)
            .with_context(|| format!("failed writing {}", staging.display()))?;
        std::fs::rename(&staging, &path)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    pub fn read(&self, id: &str) -> anyhow::Result<Option<ImportTask>> {
        let path = self.record_path(id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", path.display()))
            }
        };
        let task = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt task record {}", path.display()))?;
        Ok(Some(task))
    }
}

/// Memory-first store whose terminal transitions are mirrored to a
/// [`TaskArchive`]. Memory is authoritative while a task is in flight; the
/// archive answers for tasks from earlier processes.
#[derive(Debug)]
pub struct MirroredTaskStore {
    memory: MemoryTaskStore,
    archive: TaskArchive,
}

impl MirroredTaskStore {
    pub fn new(archive: TaskArchive) -> Self {
        Self {
            memory: MemoryTaskStore::new(),
            archive,
        }
    }

    pub fn archive(&self) -> &TaskArchive {
        &self.archive
    }
}

impl TaskStore for MirroredTaskStore {
    fn put(&self, task: ImportTask) -> anyhow::Result<()> {
        if self.archive.read(&task.id)?.is_some() {
            bail!("task {} already exists", task.id);
        }
        self.memory.put(task)
    }

    fn get(&self, id: &str) -> anyhow::Result<Option<ImportTask>> {
        if let Some(task) = self.memory.get(id)? {
            return Ok(Some(task));
        }
        self.archive.read(id)
    }

    fn compare_and_swap_status(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> anyhow::Result<bool> {
        self.memory.swap_with(id, expected, update, |task| {
            if task.status.is_terminal() {
                self.archive.write(task)?;
            }
            Ok(())
        })
    }
}

fn is_safe_task_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[cfg(test)]
mod tests {
    use crate::elements::default_elements;

    use super::*;

    fn completed() -> TaskUpdate {
        TaskUpdate::Completed(ImportResult {
            elements: default_elements(),
            preview: "previews/preview-t1.png".to_string(),
        })
    }

    #[test]
    fn memory_store_cas_only_applies_from_expected_status() -> anyhow::Result<()> {
        let store = MemoryTaskStore::new();
        store.put(ImportTask::pending("t1", "user-1", "/tmp/s.png"))?;

        assert!(!store.compare_and_swap_status("t1", TaskStatus::Processing, completed())?);
        assert!(store.compare_and_swap_status("t1", TaskStatus::Pending, TaskUpdate::Processing)?);
        assert!(!store.compare_and_swap_status("t1", TaskStatus::Pending, TaskUpdate::Processing)?);
        assert!(store.compare_and_swap_status("t1", TaskStatus::Processing, completed())?);
        assert!(!store.compare_and_swap_status("missing", TaskStatus::Pending, TaskUpdate::Processing)?);

        let task = store.get("t1")?.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.unwrap().elements.len(), 3);
        Ok(())
    }

    #[test]
    fn put_rejects_duplicate_ids() -> anyhow::Result<()> {
        let store = MemoryTaskStore::new();
        store.put(ImportTask::pending("t1", "u", "a.png"))?;
        assert!(store.put(ImportTask::pending("t1", "u", "b.png")).is_err());
        Ok(())
    }

    #[test]
    fn mirrored_store_persists_terminal_state_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let archive = TaskArchive::new(temp.path().join("tasks"));
        let store = MirroredTaskStore::new(archive.clone());
        store.put(ImportTask::pending("t1", "user-1", "/tmp/s.png"))?;
        store.compare_and_swap_status("t1", TaskStatus::Pending, TaskUpdate::Processing)?;
        assert!(archive.read("t1")?.is_none());

        store.compare_and_swap_status("t1", TaskStatus::Processing, completed())?;
        let persisted = archive.read("t1")?.unwrap();
        assert_eq!(persisted.status, TaskStatus::Completed);

        // A fresh process only sees the archive.
        let restarted = MirroredTaskStore::new(archive);
        assert_eq!(restarted.get("t1")?, Some(persisted));
        assert!(restarted.put(ImportTask::pending("t1", "u", "x.png")).is_err());
        Ok(())
    }

    #[test]
    fn failed_tasks_are_persisted_with_error_text() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = MirroredTaskStore::new(TaskArchive::new(temp.path()));
        store.put(ImportTask::pending("t2", "user-1", "/tmp/s.png"))?;
        store.compare_and_swap_status("t2", TaskStatus::Pending, TaskUpdate::Processing)?;
        store.compare_and_swap_status(
            "t2",
            TaskStatus::Processing,
            TaskUpdate::Failed("disk full".to_string()),
        )?;
        let persisted = store.archive().read("t2")?.unwrap();
        assert_eq!(persisted.status, TaskStatus::Failed);
        assert_eq!(persisted.error.as_deref(), Some("disk full"));
        Ok(())
    }

    #[test]
    fn unpersisted_terminal_state_is_not_committed() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("tasks");
        let store = MirroredTaskStore::new(TaskArchive::new(&dir));
        store.put(ImportTask::pending("t3", "user-1", "/tmp/s.png"))?;
        store.compare_and_swap_status("t3", TaskStatus::Pending, TaskUpdate::Processing)?;

        // A plain file where the archive directory should be.
        std::fs::write(&dir, "not a directory")?;
        let failed = TaskUpdate::Failed("boom".to_string());
        assert!(store
            .compare_and_swap_status("t3", TaskStatus::Processing, failed.clone())
            .is_err());
        assert_eq!(store.get("t3")?.map(|task| task.status), Some(TaskStatus::Processing));

        std::fs::remove_file(&dir)?;
        assert!(store.compare_and_swap_status("t3", TaskStatus::Processing, failed)?);
        assert_eq!(store.archive().read("t3")?.map(|task| task.status), Some(TaskStatus::Failed));
        Ok(())
    }

    #[test]
    fn archive_rejects_path_like_ids() {
        let archive = TaskArchive::new("/tmp/tasks");
        assert!(archive.record_path("../etc/passwd").is_err());
        assert!(archive.record_path("").is_err());
        assert!(archive.record_path("3f1c-aa_01").is_ok());
    }
}
