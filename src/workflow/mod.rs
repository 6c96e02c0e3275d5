//! The four-stage editorial workflow.
//!
//! ```text
//! created ─► content ─► rt ─► de ─► validator ─► completed
//! ```
//!
//! Each stage runs on a working copy of the stored task: prompt, generate,
//! extract, sanitize, build questions, merge. The copy replaces the stored
//! task only when every step succeeded, so a failed stage changes nothing.

mod error;
mod merge;
mod prompt;

pub use error::WorkflowError;
pub use merge::{replace_by_objective, validation_kind, MergeStats};
pub use prompt::build_prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StageBudgets;
use crate::extract::{development_report, parse_objectives, validated_questions, Extractor};
use crate::llm::GenerativeService;
use crate::materials::MaterialSource;
use crate::question::{check_compliance, render_document, Question, ValidationKind};
use crate::report::{Report, ReportKind, ValidationSummary};
use crate::store::TaskStore;
use crate::task::{objective_id, Stage, Task, TaskId, TaskStatus};
use crate::util::preview;
use crate::vocabulary::{ReplacementTable, VocabularyFilter};

/// Result of `advance`, with every error already turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub success: bool,
    pub message: String,
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub current_agent: Option<Stage>,
    pub questions_count: usize,
    pub reports_count: usize,
}

/// Locations of the outputs of a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResults {
    pub questions_path: String,
    pub report_path: String,
    pub document_path: String,
}

/// Drives tasks through the stages.
pub struct WorkflowEngine {
    service: Arc<dyn GenerativeService>,
    store: Arc<dyn TaskStore>,
    source: Arc<dyn MaterialSource>,
    extractor: Extractor,
    replacements: ReplacementTable,
    budgets: StageBudgets,
}

impl WorkflowEngine {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        store: Arc<dyn TaskStore>,
        source: Arc<dyn MaterialSource>,
    ) -> Self {
        Self {
            service,
            store,
            source,
            extractor: Extractor::default(),
            replacements: ReplacementTable::default(),
            budgets: StageBudgets::default(),
        }
    }

    pub fn with_budgets(mut self, budgets: StageBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_replacements(mut self, replacements: ReplacementTable) -> Self {
        self.replacements = replacements;
        self
    }

    /// Create and checkpoint a task.
    ///
    /// `objectives_text` is free text; objectives are parsed from it and
    /// numbered `Obj.N`.
    pub async fn create_task(
        &self,
        objectives_text: &str,
        theory_text: &str,
    ) -> Result<TaskId, WorkflowError> {
        if theory_text.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "theory text cannot be empty".to_string(),
            ));
        }
        let objectives = parse_objectives(objectives_text);
        if objectives.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "no learning objective could be parsed".to_string(),
            ));
        }

        let materials = self.source.load().await;
        if let Err(e) = self.replacements.verify(&materials.stopwords) {
            warn!("Replacement table does not fit this task's stopwords: {}", e);
        }

        let task = Task::new(objectives, theory_text.to_string(), materials)
            .map_err(|e| WorkflowError::InvalidInput(e.to_string()))?;
        self.store
            .save_task(&task)
            .await
            .map_err(WorkflowError::Persistence)?;

        info!(
            task_id = %task.id(),
            objectives = task.objectives().len(),
            stopwords = task.stopwords().len(),
            "Task created"
        );
        Ok(task.id())
    }

    /// Run one stage, reporting failure as an unsuccessful outcome.
    pub async fn advance(&self, id: TaskId, stage: Stage) -> StageOutcome {
        match self.try_advance(id, stage).await {
            Ok(message) => StageOutcome {
                success: true,
                message,
            },
            Err(e) => StageOutcome {
                success: false,
                message: match e.stage() {
                    Some(_) => e.to_string(),
                    None => format!("{} stage failed: {}", stage, e),
                },
            },
        }
    }

    /// Run one stage and commit the task on success.
    pub async fn try_advance(&self, id: TaskId, stage: Stage) -> Result<String, WorkflowError> {
        let stored = self.load(id).await?;

        let mut task = stored.clone();
        task.begin_stage(stage)
            .map_err(|e| WorkflowError::StagePrecondition {
                stage,
                reason: e.to_string(),
            })?;

        info!(task_id = %id, %stage, questions = task.questions().len(), "Stage started");

        let prompt = build_prompt(stage, &task);
        let response = self
            .service
            .complete(&prompt, self.budgets.for_stage(stage))
            .await
            .map_err(|source| WorkflowError::CollaboratorUnavailable { stage, source })?;
        debug!(%stage, chars = response.len(), preview = %preview(&response, 200), "Response received");

        let questions = self.build_questions(&task, &response, stage);
        if questions.is_empty() {
            warn!(task_id = %id, %stage, "Stage produced no usable questions");
            return Err(WorkflowError::ExtractionEmpty { stage });
        }

        let message = match stage {
            Stage::Content => {
                let uncovered: Vec<&str> = task
                    .objectives()
                    .iter()
                    .map(|o| objective_id(o))
                    .filter(|id| !questions.iter().any(|q| q.objective_id == *id))
                    .collect();
                if !uncovered.is_empty() {
                    warn!(task_id = %id, ?uncovered, "Objectives without a drafted question");
                }

                let created = questions.len();
                for question in questions {
                    task.push_question(question);
                }
                format!("content stage completed: {} questions created", created)
            }
            _ => {
                let stats = replace_by_objective(task.questions_mut(), questions, stage);
                if stage.is_review() {
                    self.save_review_summary(&task, stage).await?;
                    format!(
                        "{} stage completed: {} questions reviewed, {} unmatched",
                        stage, stats.replaced, stats.dropped
                    )
                } else {
                    self.finish_validation(&mut task, &response).await?;
                    format!(
                        "validator stage completed: {} questions validated, {} unmatched",
                        stats.replaced, stats.dropped
                    )
                }
            }
        };

        task.finish_stage(stage)
            .map_err(|e| WorkflowError::StagePrecondition {
                stage,
                reason: e.to_string(),
            })?;
        if stage == Stage::Validator {
            task.complete()
                .map_err(|e| WorkflowError::StagePrecondition {
                    stage,
                    reason: e.to_string(),
                })?;
        }

        self.store
            .save_task(&task)
            .await
            .map_err(WorkflowError::Persistence)?;

        info!(task_id = %id, %stage, status = %task.status(), "Stage committed");
        Ok(message)
    }

    /// Extract, sanitize and promote the records of one response.
    fn build_questions(&self, task: &Task, response: &str, stage: Stage) -> Vec<Question> {
        let filter = VocabularyFilter::new(task.stopwords(), &self.replacements);
        let mut questions = Vec::new();

        for mut record in self.extractor.extract_records(response) {
            let rewritten = filter.sanitize_record(&mut record);
            if rewritten > 0 {
                debug!(%stage, rewritten, "Restricted terms replaced");
            }

            match Question::from_record(&record, stage) {
                Ok(question) => {
                    let compliance = check_compliance(&question);
                    if !compliance.compliant {
                        warn!(
                            %stage,
                            objective_id = %question.objective_id,
                            issues = ?compliance.issues,
                            "Question does not follow its template"
                        );
                    }
                    questions.push(question);
                }
                Err(e) => warn!(%stage, "Dropping malformed record: {}", e),
            }
        }
        questions
    }

    async fn save_review_summary(&self, task: &Task, stage: Stage) -> Result<(), WorkflowError> {
        let Some(kind) = validation_kind(stage) else {
            return Ok(());
        };
        let summary = ValidationSummary::from_questions(task.questions(), kind);
        let location = self
            .store
            .save_report(task.id(), &summary.artifact_name(), &summary.to_markdown())
            .await
            .map_err(WorkflowError::Persistence)?;
        debug!(%stage, approved = summary.approved(), %location, "Review summary saved");
        Ok(())
    }

    /// Append the development report and save the three final artifacts.
    async fn finish_validation(&self, task: &mut Task, response: &str) -> Result<(), WorkflowError> {
        let report = development_report(response).unwrap_or_else(|| {
            warn!(task_id = %task.id(), "No development report in response, summarizing reviews");
            summary_report(task.questions())
        });
        let document = validated_questions(response).unwrap_or_else(|| {
            warn!(task_id = %task.id(), "No validated-questions section in response, rendering it");
            render_document(task.questions())
        });

        task.push_report(Report::development(Stage::Validator, report.clone()));

        let id = task.id();
        self.store
            .save_questions(id, task.questions())
            .await
            .map_err(WorkflowError::Persistence)?;
        self.store
            .save_report(id, ReportKind::DevelopmentReport.artifact_name(), &report)
            .await
            .map_err(WorkflowError::Persistence)?;
        self.store
            .save_final_document(id, &document)
            .await
            .map_err(WorkflowError::Persistence)?;
        Ok(())
    }

    pub async fn status(&self, id: TaskId) -> Result<TaskStatusView, WorkflowError> {
        let task = self.load(id).await?;
        Ok(TaskStatusView {
            task_id: id,
            status: task.status(),
            current_agent: task.current_agent(),
            questions_count: task.questions().len(),
            reports_count: task.reports().len(),
        })
    }

    /// Output locations; only available once the task has completed.
    pub async fn results(&self, id: TaskId) -> Result<TaskResults, WorkflowError> {
        let task = self.load(id).await?;
        if task.status() != TaskStatus::Completed {
            return Err(WorkflowError::NotCompleted(id));
        }

        let artifacts = self
            .store
            .artifacts(id)
            .await
            .map_err(WorkflowError::Persistence)?;
        let missing = |name: &str| WorkflowError::Persistence(format!("{} for task {} is missing", name, id));
        Ok(TaskResults {
            questions_path: artifacts.questions.ok_or_else(|| missing("questions"))?,
            report_path: artifacts
                .development_report
                .ok_or_else(|| missing("development report"))?,
            document_path: artifacts
                .final_document
                .ok_or_else(|| missing("final document"))?,
        })
    }

    /// Run the remaining stages in order, stopping at the first failure.
    ///
    /// Returns one message per stage that ran.
    pub async fn run_pipeline(&self, id: TaskId) -> Result<Vec<String>, WorkflowError> {
        let mut messages = Vec::new();
        while let Some(stage) = self.load(id).await?.next_stage() {
            let message = self.try_advance(id, stage).await?;
            info!(task_id = %id, "{}", message);
            messages.push(message);
        }
        Ok(messages)
    }

    async fn load(&self, id: TaskId) -> Result<Task, WorkflowError> {
        self.store
            .load_task(id)
            .await
            .map_err(WorkflowError::Persistence)?
            .ok_or(WorkflowError::TaskNotFound(id))
    }
}

/// Development report built from the review verdicts when the response has none.
fn summary_report(questions: &[Question]) -> String {
    let mut md = format!(
        "# Relatório de Desenvolvimento\n\n## Resumo\n\n{} questões concluíram as quatro etapas.\n\n",
        questions.len()
    );
    for kind in [ValidationKind::Rt, ValidationKind::De, ValidationKind::Final] {
        let summary = ValidationSummary::from_questions(questions, kind);
        md.push_str(&format!(
            "- Revisão {}: {} de {} aprovadas\n",
            kind.as_str(),
            summary.approved(),
            summary.lines.len()
        ));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FallbackService, LlmError, StandInService};
    use crate::materials::BuiltinSource;
    use crate::question::tests::sample_record;
    use crate::store::{InMemoryTaskStore, FINAL_DOCUMENT};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const OBJECTIVES: &str = "Obj.1: Explicar a formação das nuvens\nObj.2: Descrever a precipitação";
    const THEORY: &str = "A água evapora, condensa em nuvens e precipita.";

    /// Fixed answers per stage; stages without one get the stand-in answer.
    struct Scripted {
        answers: HashMap<Stage, String>,
    }

    impl Scripted {
        fn new(answers: &[(Stage, String)]) -> Self {
            Self {
                answers: answers.iter().cloned().collect(),
            }
        }
    }

    #[async_trait]
    impl GenerativeService for Scripted {
        async fn complete(&self, prompt: &str, _max: u64) -> Result<String, LlmError> {
            match Stage::detect(prompt).and_then(|stage| self.answers.get(&stage)) {
                Some(answer) => Ok(answer.clone()),
                None => Ok(StandInService.respond(prompt)),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Down;

    #[async_trait]
    impl GenerativeService for Down {
        async fn complete(&self, _prompt: &str, _max: u64) -> Result<String, LlmError> {
            Err(LlmError::network_error("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn engine(service: impl GenerativeService + 'static) -> (WorkflowEngine, Arc<InMemoryTaskStore>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let engine = WorkflowEngine::new(Arc::new(service), store.clone(), Arc::new(BuiltinSource));
        (engine, store)
    }

    fn fenced(records: Vec<Value>) -> String {
        format!("```json\n{}\n```", json!({ "questions": records }))
    }

    #[tokio::test]
    async fn test_create_task_rejects_blank_input() {
        let (engine, _) = engine(StandInService);
        assert!(matches!(
            engine.create_task(OBJECTIVES, "  ").await,
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.create_task("", THEORY).await,
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_full_pipeline_with_standin() {
        let (engine, store) = engine(StandInService);
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();

        let messages = engine.run_pipeline(id).await.unwrap();
        assert_eq!(messages.len(), 4);

        let status = engine.status(id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Completed);
        assert_eq!(status.current_agent, Some(Stage::Validator));
        assert_eq!(status.questions_count, 2);
        assert_eq!(status.reports_count, 1);

        let results = engine.results(id).await.unwrap();
        assert!(results.document_path.ends_with("final_document"));
        let document = store.document(id, FINAL_DOCUMENT).await.unwrap();
        assert!(document.starts_with("# Questões Validadas"));
        assert!(store.document(id, "validation_rt").await.is_some());

        let task = store.load_task(id).await.unwrap().unwrap();
        for question in task.questions() {
            assert!(question.validation.rt.is_some());
            assert!(question.validation.de.is_some());
            assert!(question.validation.final_review.is_some());
            assert_eq!(question.metadata.created_by, "content");
            assert_eq!(question.metadata.last_modified_by, "validator");
        }

        let outcome = engine.advance(id, Stage::Content).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("already completed"));
    }

    #[tokio::test]
    async fn test_review_on_empty_task_changes_nothing() {
        let (engine, store) = engine(StandInService);
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();

        let outcome = engine.advance(id, Stage::Rt).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("rt stage cannot run"));

        let task = store.load_task(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Created);
        assert_eq!(task.current_agent(), None);
    }

    #[tokio::test]
    async fn test_stages_cannot_be_skipped() {
        let (engine, _) = engine(StandInService);
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        engine.try_advance(id, Stage::Content).await.unwrap();

        assert!(matches!(
            engine.try_advance(id, Stage::De).await,
            Err(WorkflowError::StagePrecondition { stage: Stage::De, .. })
        ));
        assert_eq!(engine.status(id).await.unwrap().current_agent, Some(Stage::Content));
    }

    #[tokio::test]
    async fn test_empty_extraction_leaves_task_untouched() {
        let (engine, store) = engine(Scripted::new(&[(
            Stage::Content,
            "Desculpe, não consegui elaborar as questões.".to_string(),
        )]));
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        let before = store.load_task(id).await.unwrap().unwrap();

        let err = engine.try_advance(id, Stage::Content).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ExtractionEmpty { stage: Stage::Content }));

        let after = store.load_task(id).await.unwrap().unwrap();
        assert_eq!(after.status(), before.status());
        assert_eq!(after.updated_at(), before.updated_at());
        assert!(after.questions().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_records_are_dropped_and_text_sanitized() {
        let mut broken = sample_record("Obj.2");
        broken.remove("statement");
        let mut restricted = sample_record("Obj.1");
        restricted.insert(
            "context".to_string(),
            json!("Apenas uma cidade registra chuvas intensas."),
        );
        let answer = fenced(vec![Value::Object(restricted), Value::Object(broken)]);

        let (engine, store) = engine(Scripted::new(&[(Stage::Content, answer)]));
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        engine.try_advance(id, Stage::Content).await.unwrap();

        let task = store.load_task(id).await.unwrap().unwrap();
        assert_eq!(task.questions().len(), 1);
        assert_eq!(
            task.questions()[0].context,
            "Principalmente uma cidade registra chuvas intensas."
        );
    }

    #[tokio::test]
    async fn test_review_replaces_matching_objective_only() {
        let mut reviewed = sample_record("Obj.2");
        reviewed.insert("statement".to_string(), json!("Qual processo forma a chuva?"));
        reviewed.insert(
            "validation".to_string(),
            json!({"rt": {"status": "rejected", "comments": "Enunciado vago"}}),
        );
        let answer = fenced(vec![Value::Object(reviewed), Value::Object(sample_record("Obj.7"))]);

        let (engine, store) = engine(Scripted::new(&[(Stage::Rt, answer)]));
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        engine.try_advance(id, Stage::Content).await.unwrap();
        let message = engine.try_advance(id, Stage::Rt).await.unwrap();
        assert!(message.contains("1 questions reviewed, 1 unmatched"));

        let task = store.load_task(id).await.unwrap().unwrap();
        assert_eq!(task.questions().len(), 2);
        assert_eq!(task.questions()[0].objective_id, "Obj.1");
        assert_eq!(task.questions()[1].statement, "Qual processo forma a chuva?");
        let verdict = task.questions()[1].validation.rt.as_ref().unwrap();
        assert!(verdict.timestamp.is_some());

        let summary = store.document(id, "validation_rt").await.unwrap();
        assert!(summary.contains("Enunciado vago"));
    }

    #[tokio::test]
    async fn test_validator_without_sections_renders_document() {
        let (engine, store) = engine(Scripted::new(&[(
            Stage::Validator,
            fenced(vec![Value::Object(sample_record("Obj.1"))]),
        )]));
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        engine.run_pipeline(id).await.unwrap();

        let document = store.document(id, FINAL_DOCUMENT).await.unwrap();
        assert!(document.starts_with("# Questões Validadas"));
        assert!(document.contains("## Obj.2"));
        let report = store.document(id, "development").await.unwrap();
        assert!(report.starts_with("# Relatório de Desenvolvimento"));
    }

    #[tokio::test]
    async fn test_validator_sections_are_saved_verbatim() {
        let report = "# Relatório de Desenvolvimento\n\nA revisão técnica corrigiu o gabarito da Obj.2.";
        let document = "# Questões Validadas\n\n## Obj.1\n\nTexto final redigido pelo validador.";
        let answer = format!(
            "Segue o resultado.\n\n{}\n\n```markdown\n{}\n```\n\n```markdown\n{}\n```\n",
            fenced(vec![Value::Object(sample_record("Obj.1"))]),
            report,
            document
        );

        let (engine, store) = engine(Scripted::new(&[(Stage::Validator, answer)]));
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        engine.run_pipeline(id).await.unwrap();

        assert_eq!(store.document(id, FINAL_DOCUMENT).await.as_deref(), Some(document));
        assert_ne!(
            store.document(id, FINAL_DOCUMENT).await.unwrap(),
            render_document(store.load_task(id).await.unwrap().unwrap().questions())
        );
        assert_eq!(store.document(id, "development").await.as_deref(), Some(report));

        let status = engine.status(id).await.unwrap();
        assert_eq!(status.reports_count, 1);
        let task = store.load_task(id).await.unwrap().unwrap();
        assert_eq!(task.reports()[0].content, report);
    }

    #[tokio::test]
    async fn test_results_require_completion() {
        let (engine, _) = engine(StandInService);
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        assert!(matches!(
            engine.results(id).await,
            Err(WorkflowError::NotCompleted(_))
        ));
        assert!(matches!(
            engine.status(TaskId::new()).await,
            Err(WorkflowError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let (engine, _) = engine(Down);
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        assert!(matches!(
            engine.try_advance(id, Stage::Content).await,
            Err(WorkflowError::CollaboratorUnavailable { stage: Stage::Content, .. })
        ));

        let (engine, _) = engine_with_fallback();
        let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
        assert!(engine.advance(id, Stage::Content).await.success);
    }

    fn engine_with_fallback() -> (WorkflowEngine, Arc<InMemoryTaskStore>) {
        engine(FallbackService::new(Down))
    }
}
