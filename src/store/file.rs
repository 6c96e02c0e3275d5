//! JSON file-based task store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{
    questions_json, sanitize_filename, TaskArtifacts, TaskStore, DEVELOPMENT_REPORT, FINAL_DOCUMENT,
};
use crate::question::Question;
use crate::task::{Task, TaskId};

/// Snapshots go to `data_dir`, artifacts to `output_dir`.
#[derive(Clone)]
pub struct FileTaskStore {
    data_dir: PathBuf,
    output_dir: PathBuf,
    persist_lock: Arc<Mutex<()>>,
}

impl FileTaskStore {
    pub async fn new(data_dir: PathBuf, output_dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| format!("Failed to create data dir {}: {}", data_dir.display(), e))?;
        fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| format!("Failed to create output dir {}: {}", output_dir.display(), e))?;

        Ok(Self {
            data_dir,
            output_dir,
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    fn task_path(&self, id: TaskId) -> PathBuf {
        self.data_dir.join(format!("task_{}.json", id))
    }

    fn questions_path(&self, id: TaskId) -> PathBuf {
        self.output_dir.join(format!("questions_{}.json", id))
    }

    fn markdown_path(&self, id: TaskId, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.md", sanitize_filename(kind), id))
    }

    /// Replace `path` with `data`: back up the old file, write a temp file,
    /// then rename it into place.
    async fn persist(&self, path: &Path, data: &[u8]) -> Result<String, String> {
        let _guard = self.persist_lock.lock().await;

        if fs::try_exists(path).await.unwrap_or(false) {
            let backup = with_suffix(path, "bak");
            if let Err(e) = fs::copy(path, &backup).await {
                tracing::warn!("Failed to back up {}: {}", path.display(), e);
            }
        }

        let tmp_path = with_suffix(path, "tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|e| format!("Failed to write {}: {}", tmp_path.display(), e))?;
        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| format!("Failed to finalize {}: {}", path.display(), e))?;

        tracing::debug!(path = %path.display(), bytes = data.len(), "Saved");
        Ok(path.display().to_string())
    }
}

/// `questions_x.json` -> `questions_x.json.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

async fn existing(path: PathBuf) -> Option<String> {
    match fs::try_exists(&path).await {
        Ok(true) => Some(path.display().to_string()),
        _ => None,
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn save_task(&self, task: &Task) -> Result<(), String> {
        let data = serde_json::to_vec_pretty(task)
            .map_err(|e| format!("Failed to serialize task {}: {}", task.id(), e))?;
        self.persist(&self.task_path(task.id()), &data).await?;
        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, String> {
        let path = self.task_path(id);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Task>(&bytes)
                .map(Some)
                .map_err(|e| format!("Failed to parse task {}: {}", path.display(), e)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(format!("Failed to read task {}: {}", path.display(), err)),
        }
    }

    async fn save_questions(&self, id: TaskId, questions: &[Question]) -> Result<String, String> {
        let data = questions_json(questions)?;
        self.persist(&self.questions_path(id), data.as_bytes()).await
    }

    async fn save_report(&self, id: TaskId, kind: &str, text: &str) -> Result<String, String> {
        self.persist(&self.markdown_path(id, kind), text.as_bytes())
            .await
    }

    async fn save_final_document(&self, id: TaskId, text: &str) -> Result<String, String> {
        self.persist(&self.markdown_path(id, FINAL_DOCUMENT), text.as_bytes())
            .await
    }

    async fn artifacts(&self, id: TaskId) -> Result<TaskArtifacts, String> {
        Ok(TaskArtifacts {
            questions: existing(self.questions_path(id)).await,
            development_report: existing(self.markdown_path(id, DEVELOPMENT_REPORT)).await,
            final_document: existing(self.markdown_path(id, FINAL_DOCUMENT)).await,
        })
    }
}
