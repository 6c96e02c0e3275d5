//! Deterministic stand-in responses, used offline and when the real service fails.
//!
//! The stand-in recognises the asking stage from the prompt's role marker:
//! - content: one canned single-answer question per `Obj.N:` line in the prompt
//! - rt / de: echoes the questions embedded in the prompt with an approval added
//! - validator: the same, plus the development report and final document sections

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use super::{GenerativeService, LlmError};
use crate::extract::{extract_records, Record};
use crate::question::{render_document, Question};
use crate::task::Stage;

const UNRECOGNISED: &str = "Resposta de substituição: nenhuma etapa reconhecida no pedido.";

#[derive(Debug, Clone, Copy, Default)]
pub struct StandInService;

fn objective_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(Obj\.\d+):\s*(.+?)\s*$").expect("objective line regex"))
}

impl StandInService {
    /// The canned response for `prompt`.
    pub fn respond(&self, prompt: &str) -> String {
        match Stage::detect(prompt) {
            Some(Stage::Content) => content_response(prompt),
            Some(stage @ (Stage::Rt | Stage::De)) => review_response(prompt, stage),
            Some(Stage::Validator) => validator_response(prompt),
            None => UNRECOGNISED.to_string(),
        }
    }
}

#[async_trait]
impl GenerativeService for StandInService {
    async fn complete(&self, prompt: &str, _max_output_tokens: u64) -> Result<String, LlmError> {
        Ok(self.respond(prompt))
    }

    fn name(&self) -> &str {
        "stand_in"
    }
}

fn fenced_questions(records: Vec<Value>) -> String {
    let body = json!({ "questions": records });
    let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    format!("```json\n{}\n```", pretty)
}

fn canned_question(objective_id: &str, objective: &str) -> Value {
    json!({
        "objective_id": objective_id,
        "type": "single_answer",
        "context": format!("Uma equipe de estudos revisa o tema: {}", objective),
        "statement": "Qual atitude demonstra o domínio do objetivo apresentado no contexto?",
        "alternatives": [
            {"id": "a", "text": "Aplicar o conceito a uma situação nova e justificar a escolha.", "correct": true},
            {"id": "b", "text": "Repetir a definição sem relacioná-la ao problema.", "correct": false},
            {"id": "c", "text": "Ignorar os dados apresentados no contexto.", "correct": false},
            {"id": "d", "text": "Escolher a resposta mais longa.", "correct": false},
            {"id": "e", "text": "Adiar a análise para outro momento.", "correct": false}
        ],
        "feedback": {
            "a": "Correta. Transferir o conceito para um caso novo evidencia compreensão.",
            "b": "Incorreta. Memorizar a definição não demonstra aplicação.",
            "c": "Incorreta. Os dados do contexto são necessários para a resposta.",
            "d": "Incorreta. O tamanho da alternativa não indica correção.",
            "e": "Incorreta. Adiar a análise não resolve o problema proposto."
        }
    })
}

fn content_response(prompt: &str) -> String {
    let questions: Vec<Value> = objective_line()
        .captures_iter(prompt)
        .map(|caps| canned_question(&caps[1], &caps[2]))
        .collect();
    if questions.is_empty() {
        return UNRECOGNISED.to_string();
    }
    fenced_questions(questions)
}

fn approve(mut record: Record, slot: &str, comments: &str) -> Value {
    let validation = record
        .entry("validation")
        .or_insert_with(|| json!({"rt": null, "de": null, "final": null}));
    if !validation.is_object() {
        *validation = json!({"rt": null, "de": null, "final": null});
    }
    validation[slot] = json!({
        "status": "approved",
        "comments": comments,
        "checklist": {}
    });
    Value::Object(record)
}

fn review_response(prompt: &str, stage: Stage) -> String {
    let records = extract_records(prompt);
    if records.is_empty() {
        return UNRECOGNISED.to_string();
    }
    let reviewed = records
        .into_iter()
        .map(|r| approve(r, stage.as_str(), "Aprovada sem alterações pela revisão automática."))
        .collect();
    fenced_questions(reviewed)
}

fn validator_response(prompt: &str) -> String {
    let records: Vec<Record> = extract_records(prompt)
        .into_iter()
        .filter_map(|r| match approve(r, "final", "Validada.") {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if records.is_empty() {
        return UNRECOGNISED.to_string();
    }

    let questions: Vec<Question> = records
        .iter()
        .filter_map(|r| Question::from_record(r, Stage::Validator).ok())
        .collect();

    format!(
        "{}\n\n```markdown\n# Relatório de Desenvolvimento\n\n\
         ## Resumo\n\n{} questões percorreram as quatro etapas sem alterações.\n\n\
         ## Recomendações para Melhoria do Prompt\n\n\
         1. Solicitar contextualizações com dados reais.\n\
         ```\n\n```markdown\n{}```",
        fenced_questions(records.into_iter().map(Value::Object).collect()),
        questions.len(),
        render_document(&questions)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{development_report, validated_questions};
    use crate::question::tests::sample_question;

    fn review_prompt(stage: Stage) -> String {
        let questions = vec![sample_question("Obj.1"), sample_question("Obj.2")];
        format!(
            "Você é um {}.\n\n```json\n{}\n```",
            stage.role_marker(),
            serde_json::to_string_pretty(&json!({ "questions": questions })).unwrap()
        )
    }

    #[test]
    fn test_content_one_question_per_objective() {
        let prompt = "Você é um Professor-Conteudista.\nObjetivos:\nObj.1: Identificar nuvens\nObj.2: Descrever chuva\n";
        let records = extract_records(&StandInService.respond(prompt));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["objective_id"], "Obj.2");
        let question = Question::from_record(&records[0], Stage::Content).unwrap();
        assert!(crate::question::check_compliance(&question).compliant);
    }

    #[test]
    fn test_review_echoes_with_approval() {
        let records = extract_records(&StandInService.respond(&review_prompt(Stage::De)));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["validation"]["de"]["status"], "approved");
        assert!(records[0]["validation"]["rt"].is_null());
    }

    #[test]
    fn test_validator_has_both_sections() {
        let response = StandInService.respond(&review_prompt(Stage::Validator));
        assert_eq!(extract_records(&response).len(), 2);
        assert!(development_report(&response).unwrap().contains("2 questões"));
        assert!(validated_questions(&response).unwrap().contains("## Obj.2"));
    }

    #[test]
    fn test_unrecognised_prompt_yields_nothing_usable() {
        let response = StandInService.respond("hello");
        assert!(extract_records(&response).is_empty());
    }
}
