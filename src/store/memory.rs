//! In-memory task store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{questions_json, TaskArtifacts, TaskStore, DEVELOPMENT_REPORT, FINAL_DOCUMENT};
use crate::question::Question;
use crate::task::{Task, TaskId};

/// Keyed by task, then by artifact name.
type Documents = HashMap<TaskId, HashMap<String, String>>;

const QUESTIONS: &str = "questions";

#[derive(Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    documents: Arc<RwLock<Documents>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            documents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Contents of a saved artifact.
    pub async fn document(&self, id: TaskId, name: &str) -> Option<String> {
        self.documents
            .read()
            .await
            .get(&id)
            .and_then(|docs| docs.get(name).cloned())
    }

    async fn put(&self, id: TaskId, name: &str, text: String) -> String {
        self.documents
            .write()
            .await
            .entry(id)
            .or_default()
            .insert(name.to_string(), text);
        location(id, name)
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn location(id: TaskId, name: &str) -> String {
    format!("memory://{}/{}", id, name)
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn save_task(&self, task: &Task) -> Result<(), String> {
        self.tasks.write().await.insert(task.id(), task.clone());
        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, String> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save_questions(&self, id: TaskId, questions: &[Question]) -> Result<String, String> {
        let text = questions_json(questions)?;
        Ok(self.put(id, QUESTIONS, text).await)
    }

    async fn save_report(&self, id: TaskId, kind: &str, text: &str) -> Result<String, String> {
        Ok(self.put(id, kind, text.to_string()).await)
    }

    async fn save_final_document(&self, id: TaskId, text: &str) -> Result<String, String> {
        Ok(self.put(id, FINAL_DOCUMENT, text.to_string()).await)
    }

    async fn artifacts(&self, id: TaskId) -> Result<TaskArtifacts, String> {
        let documents = self.documents.read().await;
        let saved = |name: &str| {
            documents
                .get(&id)
                .filter(|docs| docs.contains_key(name))
                .map(|_| location(id, name))
        };
        Ok(TaskArtifacts {
            questions: saved(QUESTIONS),
            development_report: saved(DEVELOPMENT_REPORT),
            final_document: saved(FINAL_DOCUMENT),
        })
    }
}
