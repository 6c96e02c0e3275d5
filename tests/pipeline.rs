//! End-to-end runs of the editorial pipeline against a file store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use question_forge::llm::{GenerativeService, LlmError, StandInService};
use question_forge::materials::BuiltinSource;
use question_forge::store::{FileTaskStore, TaskStore};
use question_forge::{Stage, TaskStatus, WorkflowEngine, WorkflowError};

const OBJECTIVES: &str = "\
Objetivos da unidade:
- Obj.1: Explicar a evaporação da água
- Obj.2: Relacionar condensação e
  formação de nuvens
- Obj.3: Identificar tipos de precipitação
";

const THEORY: &str = "O ciclo da água envolve evaporação, condensação e precipitação.";

/// Stand-in answers, counting calls per stage.
#[derive(Default)]
struct CountingService {
    calls: [AtomicU32; 4],
}

impl CountingService {
    fn calls(&self, stage: Stage) -> u32 {
        self.calls[stage_index(stage)].load(Ordering::SeqCst)
    }
}

fn stage_index(stage: Stage) -> usize {
    Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0)
}

#[async_trait]
impl GenerativeService for CountingService {
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError> {
        let stage = Stage::detect(prompt).expect("every prompt names its stage");
        self.calls[stage_index(stage)].fetch_add(1, Ordering::SeqCst);
        let expected = if stage == Stage::Validator { 6000 } else { 4000 };
        assert_eq!(max_output_tokens, expected);
        Ok(StandInService.respond(prompt))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

async fn setup(
    dir: &tempfile::TempDir,
) -> (WorkflowEngine, Arc<CountingService>, Arc<FileTaskStore>) {
    let service = Arc::new(CountingService::default());
    let store = Arc::new(
        FileTaskStore::new(dir.path().join("data"), dir.path().join("output"))
            .await
            .unwrap(),
    );
    let engine = WorkflowEngine::new(service.clone(), store.clone(), Arc::new(BuiltinSource));
    (engine, service, store)
}

#[tokio::test]
async fn content_to_validator_produces_three_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, service, store) = setup(&dir).await;

    let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
    for stage in Stage::ALL {
        let outcome = engine.advance(id, stage).await;
        assert!(outcome.success, "{}: {}", stage, outcome.message);
        assert_eq!(service.calls(stage), 1);
    }

    let status = engine.status(id).await.unwrap();
    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.questions_count, 3);
    assert_eq!(status.reports_count, 1);

    let results = engine.results(id).await.unwrap();
    let questions: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&results.questions_path).unwrap()).unwrap();
    let ids: Vec<&str> = questions["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["objective_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["Obj.1", "Obj.2", "Obj.3"]);

    let report = std::fs::read_to_string(&results.report_path).unwrap();
    assert!(report.starts_with("# Relatório de Desenvolvimento"));
    let document = std::fs::read_to_string(&results.document_path).unwrap();
    assert!(document.starts_with("# Questões Validadas"));
    assert!(document.contains("## Obj.3"));

    // The snapshot on disk is enough to pick the task up again.
    let reloaded = store.load_task(id).await.unwrap().unwrap();
    assert_eq!(reloaded.current_agent(), Some(Stage::Validator));
    assert!(reloaded
        .questions()
        .iter()
        .all(|q| q.validation.final_review.is_some()));
}

#[tokio::test]
async fn review_before_content_fails_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, service, store) = setup(&dir).await;

    let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
    let before = store.load_task(id).await.unwrap().unwrap();

    let err = engine.try_advance(id, Stage::Rt).await.unwrap_err();
    assert!(matches!(err, WorkflowError::StagePrecondition { stage: Stage::Rt, .. }));
    assert_eq!(service.calls(Stage::Rt), 0);

    let after = store.load_task(id).await.unwrap().unwrap();
    assert_eq!(after.status(), TaskStatus::Created);
    assert_eq!(after.updated_at(), before.updated_at());
    assert!(store.artifacts(id).await.unwrap().questions.is_none());
}

#[tokio::test]
async fn run_pipeline_resumes_from_last_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, service, _store) = setup(&dir).await;

    let id = engine.create_task(OBJECTIVES, THEORY).await.unwrap();
    engine.try_advance(id, Stage::Content).await.unwrap();
    engine.try_advance(id, Stage::Rt).await.unwrap();

    let messages = engine.run_pipeline(id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].starts_with("validator stage completed"));
    assert_eq!(service.calls(Stage::Content), 1);
    assert_eq!(service.calls(Stage::Validator), 1);
    assert!(engine.run_pipeline(id).await.unwrap().is_empty());
}
