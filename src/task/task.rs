//! Core Task type: one run of the editorial pipeline.
//!
//! # Invariants
//! - `objectives` is non-empty and `theory_text` is non-blank (checked in `new`)
//! - `current_agent` only ever moves forward along `Stage::ALL`
//! - Once `status == Completed`, no stage may run again

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Stage;
use crate::materials::{Checklists, Materials};
use crate::question::{Question, QuestionType};
use crate::report::Report;
use crate::store::now_string;

/// Unique identifier for a task.
///
/// # Properties
/// - Globally unique
/// - Immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Created -> InProgress -> Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, no stage has started yet
    Created,
    /// At least one stage has started
    InProgress,
    /// Validator finished and artifacts were written
    Completed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Created => "created",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Identifier part of an objective line (`"Obj.1: ..."` -> `"Obj.1"`).
pub fn objective_id(objective: &str) -> &str {
    objective
        .split_once(':')
        .map(|(id, _)| id)
        .unwrap_or(objective)
        .trim()
}

/// A request to produce questions for a set of learning objectives.
///
/// # Design for Provability
/// - Fields are private; mutation goes through the stage transitions below
/// - A stage works on a clone, so a failed stage never leaves partial state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,

    /// Ordered objective lines, each `"<id>: <text>"`
    objectives: Vec<String>,

    /// Reference material the questions must be grounded in
    theory_text: String,

    /// Question template per type, loaded at creation
    templates: BTreeMap<QuestionType, String>,

    /// Restricted terms, loaded at creation
    stopwords: Vec<String>,

    /// Review checklists handed to the reviewer stages
    #[serde(default)]
    checklists: Checklists,

    questions: Vec<Question>,

    reports: Vec<Report>,

    /// Last stage that completed successfully
    current_agent: Option<Stage>,

    status: TaskStatus,

    creation_date: String,

    updated_at: String,
}

impl Task {
    /// Create a new task.
    ///
    /// # Preconditions
    /// - `objectives` contains at least one non-blank entry
    /// - `theory_text` is non-blank
    ///
    /// # Postconditions
    /// - `status == Created`, `current_agent == None`, no questions
    pub fn new(
        objectives: Vec<String>,
        theory_text: String,
        materials: Materials,
    ) -> Result<Self, TaskError> {
        let objectives: Vec<String> = objectives
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if objectives.is_empty() {
            return Err(TaskError::EmptyObjectives);
        }
        if theory_text.trim().is_empty() {
            return Err(TaskError::EmptyTheory);
        }

        let now = now_string();
        Ok(Self {
            id: TaskId::new(),
            objectives,
            theory_text,
            templates: materials.templates,
            stopwords: materials.stopwords,
            checklists: materials.checklists,
            questions: Vec::new(),
            reports: Vec::new(),
            current_agent: None,
            status: TaskStatus::Created,
            creation_date: now.clone(),
            updated_at: now,
        })
    }

    // Getters

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn objectives(&self) -> &[String] {
        &self.objectives
    }

    pub fn theory_text(&self) -> &str {
        &self.theory_text
    }

    pub fn templates(&self) -> &BTreeMap<QuestionType, String> {
        &self.templates
    }

    pub fn stopwords(&self) -> &[String] {
        &self.stopwords
    }

    pub fn checklists(&self) -> &Checklists {
        &self.checklists
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn questions_mut(&mut self) -> &mut Vec<Question> {
        &mut self.questions
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn current_agent(&self) -> Option<Stage> {
        self.current_agent
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn creation_date(&self) -> &str {
        &self.creation_date
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    /// The stage allowed to run next, `None` once completed.
    pub fn next_stage(&self) -> Option<Stage> {
        if self.status.is_terminal() {
            return None;
        }
        match self.current_agent {
            None => Some(Stage::Content),
            Some(stage) => stage.successor(),
        }
    }

    pub fn push_question(&mut self, question: Question) {
        self.questions.push(question);
        self.touch();
    }

    pub fn push_report(&mut self, report: Report) {
        self.reports.push(report);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = now_string();
    }

    // State transitions - explicit and validated

    /// Check whether `stage` may run now without mutating anything.
    ///
    /// # Errors
    /// - `AlreadyCompleted` if the task is terminal
    /// - `NoQuestions` for any stage after content when there is nothing to review
    /// - `InvalidTransition` if the predecessor is not the last completed stage
    pub fn check_ready(&self, stage: Stage) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::AlreadyCompleted);
        }
        if stage != Stage::Content && self.questions.is_empty() {
            return Err(TaskError::NoQuestions { stage });
        }
        if self.current_agent != stage.predecessor() {
            return Err(TaskError::InvalidTransition {
                from: self
                    .current_agent
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "start".to_string()),
                to: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Enter a stage: `status` becomes `InProgress`.
    pub fn begin_stage(&mut self, stage: Stage) -> Result<(), TaskError> {
        self.check_ready(stage)?;
        self.status = TaskStatus::InProgress;
        self.touch();
        Ok(())
    }

    /// Record that `stage` finished successfully.
    ///
    /// # Precondition
    /// `self.status == InProgress`
    pub fn finish_stage(&mut self, stage: Stage) -> Result<(), TaskError> {
        if self.status != TaskStatus::InProgress {
            return Err(TaskError::InvalidTransition {
                from: self.status.to_string(),
                to: stage.to_string(),
            });
        }
        self.current_agent = Some(stage);
        self.touch();
        Ok(())
    }

    /// Transition the task to Completed state.
    ///
    /// # Precondition
    /// The validator stage has finished.
    pub fn complete(&mut self) -> Result<(), TaskError> {
        match (self.status, self.current_agent) {
            (TaskStatus::InProgress, Some(Stage::Validator)) => {
                self.status = TaskStatus::Completed;
                self.touch();
                Ok(())
            }
            (status, _) => Err(TaskError::InvalidTransition {
                from: status.to_string(),
                to: TaskStatus::Completed.to_string(),
            }),
        }
    }
}

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("at least one learning objective is required")]
    EmptyObjectives,

    #[error("theory text cannot be empty")]
    EmptyTheory,

    #[error("task is already completed")]
    AlreadyCompleted,

    #[error("stage {stage} needs questions, but the task has none yet")]
    NoQuestions { stage: Stage },

    #[error("invalid stage order: {to} cannot run after {from}")]
    InvalidTransition { from: String, to: String },
}
