//! Reports: the validator's development report and the per-round review summaries.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::question::{ChecklistEntry, ChecklistResult, Question, ValidationKind};
use crate::store::now_string;
use crate::task::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    DevelopmentReport,
    ValidationReport,
}

impl ReportKind {
    /// Artifact name prefix (`development_<id>.md`, `validation_rt_<id>.md`).
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ReportKind::DevelopmentReport => "development",
            ReportKind::ValidationReport => "validation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub creation_date: String,
    pub agent: Stage,
    /// Markdown text
    pub content: String,
}

impl Report {
    fn new(kind: ReportKind, agent: Stage, content: String) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            kind,
            creation_date: now_string(),
            agent,
            content,
        }
    }

    /// The development report written by the validator.
    pub fn development(agent: Stage, content: impl Into<String>) -> Self {
        Self::new(ReportKind::DevelopmentReport, agent, content.into())
    }
}

/// Outcome of one review slot for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLine {
    pub question_id: String,
    pub objective_id: String,
    /// `None` when the reviewer left no verdict
    pub status: Option<String>,
    pub comments: String,
    pub checklist: Vec<(String, ChecklistEntry)>,
}

/// Per-question verdicts of one review slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSummary {
    pub kind: ValidationKind,
    pub lines: Vec<ValidationLine>,
}

impl ValidationSummary {
    pub fn from_questions(questions: &[Question], kind: ValidationKind) -> Self {
        let lines = questions
            .iter()
            .map(|q| {
                let outcome = q.validation.get(kind);
                ValidationLine {
                    question_id: q.id.clone(),
                    objective_id: q.objective_id.clone(),
                    status: outcome.map(|o| o.status.as_str().to_string()),
                    comments: outcome.map(|o| o.comments.clone()).unwrap_or_default(),
                    checklist: outcome
                        .map(|o| {
                            o.checklist
                                .iter()
                                .map(|(item, entry)| (item.clone(), entry.clone()))
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();
        Self { kind, lines }
    }

    /// Store artifact name, e.g. `validation_rt`.
    pub fn artifact_name(&self) -> String {
        format!(
            "{}_{}",
            ReportKind::ValidationReport.artifact_name(),
            self.kind.as_str()
        )
    }

    /// Number of questions with an `approved` verdict.
    pub fn approved(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.status.as_deref() == Some("approved"))
            .count()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Relatório de Validação ({})\n\n", self.kind.as_str());
        let _ = write!(
            md,
            "## Resumo\n\n{} de {} questões aprovadas.\n\n",
            self.approved(),
            self.lines.len()
        );
        md.push_str("## Resultados da Validação\n\n");

        for line in &self.lines {
            let _ = write!(md, "### Questão {} ({})\n\n", line.question_id, line.objective_id);
            let _ = write!(
                md,
                "**Status:** {}\n\n",
                line.status.as_deref().unwrap_or("sem parecer")
            );
            if !line.comments.is_empty() {
                let _ = write!(md, "**Comentários:** {}\n\n", line.comments);
            }
            if !line.checklist.is_empty() {
                md.push_str("#### Checklist\n\n");
                md.push_str(&checklist_table(&line.checklist));
                md.push('\n');
            }
        }
        md
    }
}

/// Render checklist entries as a Markdown table.
pub fn checklist_table(items: &[(String, ChecklistEntry)]) -> String {
    let mut md = String::from("| Nº | Item | Sim | Não | NA | Observação |\n");
    md.push_str("|---|---|---|---|---|---|\n");
    for (i, (item, entry)) in items.iter().enumerate() {
        let mark = |result: ChecklistResult| if entry.result == result { "✓" } else { "" };
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} |",
            i + 1,
            item,
            mark(ChecklistResult::Sim),
            mark(ChecklistResult::Nao),
            mark(ChecklistResult::Na),
            entry.observation
        );
    }
    md
}
