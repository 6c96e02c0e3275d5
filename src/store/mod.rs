//! Task storage module with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `file`: JSON snapshots plus Markdown artifacts on disk

mod file;
mod memory;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::question::Question;
use crate::task::{Task, TaskId};

/// Artifact name of the final document.
pub const FINAL_DOCUMENT: &str = "final_document";

/// Artifact name of the development report.
pub const DEVELOPMENT_REPORT: &str = "development";

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Sanitize a string for use as a filename.
pub fn sanitize_filename(value: &str) -> String {
    let out: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}

/// Where the outputs of a task were saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArtifacts {
    pub questions: Option<String>,
    pub development_report: Option<String>,
    pub final_document: Option<String>,
}

impl TaskArtifacts {
    /// True once all three outputs exist.
    pub fn is_complete(&self) -> bool {
        self.questions.is_some() && self.development_report.is_some() && self.final_document.is_some()
    }
}

/// Task store trait - implemented by all storage backends.
///
/// Every save is a whole-object overwrite. Save methods return the location
/// of what they wrote.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Checkpoint a task.
    async fn save_task(&self, task: &Task) -> Result<(), String>;

    /// Get a single task by ID.
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, String>;

    /// Save the question list as `{"questions": [...]}`.
    async fn save_questions(&self, id: TaskId, questions: &[Question]) -> Result<String, String>;

    /// Save a Markdown report under the artifact name `kind`.
    async fn save_report(&self, id: TaskId, kind: &str, text: &str) -> Result<String, String>;

    /// Save the final Markdown document.
    async fn save_final_document(&self, id: TaskId, text: &str) -> Result<String, String>;

    /// Locations of the outputs saved so far.
    async fn artifacts(&self, id: TaskId) -> Result<TaskArtifacts, String>;
}

/// Task store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStoreType {
    Memory,
    #[default]
    File,
}

impl std::str::FromStr for TaskStoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "file" | "json" => Ok(Self::File),
            other => Err(format!("Unknown task store: {}", other)),
        }
    }
}

/// Create a task store based on type and configuration.
pub async fn create_task_store(
    store_type: TaskStoreType,
    data_dir: PathBuf,
    output_dir: PathBuf,
) -> Result<Box<dyn TaskStore>, String> {
    match store_type {
        TaskStoreType::Memory => Ok(Box::new(InMemoryTaskStore::new())),
        TaskStoreType::File => {
            let store = FileTaskStore::new(data_dir, output_dir).await?;
            Ok(Box::new(store))
        }
    }
}

/// `{"questions": [...]}` as pretty JSON.
pub(crate) fn questions_json(questions: &[Question]) -> Result<String, String> {
    serde_json::to_string_pretty(&serde_json::json!({ "questions": questions }))
        .map_err(|e| format!("Failed to serialize questions: {}", e))
}
