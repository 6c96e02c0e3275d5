use crate::llm::LlmError;
use crate::task::{Stage, TaskId};

/// Errors surfaced by the workflow engine.
///
/// None of them is fatal: a failed stage leaves the stored task untouched.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{stage} stage produced no usable questions")]
    ExtractionEmpty { stage: Stage },

    #[error("{stage} stage cannot run: {reason}")]
    StagePrecondition { stage: Stage, reason: String },

    #[error("{stage} stage could not reach the generative service: {source}")]
    CollaboratorUnavailable {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {0} has not completed the validator stage")]
    NotCompleted(TaskId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Persistence(String),
}

impl WorkflowError {
    /// The stage the error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowError::ExtractionEmpty { stage }
            | WorkflowError::StagePrecondition { stage, .. }
            | WorkflowError::CollaboratorUnavailable { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether running the same stage again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::ExtractionEmpty { .. } | WorkflowError::Persistence(_) => true,
            WorkflowError::CollaboratorUnavailable { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_stage() {
        let err = WorkflowError::ExtractionEmpty { stage: Stage::Rt };
        assert_eq!(err.to_string(), "rt stage produced no usable questions");
        assert_eq!(err.stage(), Some(Stage::Rt));
        assert!(err.is_retryable());

        let err = WorkflowError::CollaboratorUnavailable {
            stage: Stage::Content,
            source: LlmError::client_error(401, "bad key".into()),
        };
        assert!(err.to_string().contains("HTTP 401"));
        assert!(!err.is_retryable());
        assert_eq!(WorkflowError::NotCompleted(TaskId::new()).stage(), None);
    }
}
