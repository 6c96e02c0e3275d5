//! Stage prompts.
//!
//! Every prompt opens with the stage's role marker. Review prompts embed the
//! current questions as a single fenced JSON block so the answer can echo it.

use std::fmt::Write;

use serde_json::json;

use crate::question::{Question, QuestionType};
use crate::task::{Stage, Task};

pub fn build_prompt(stage: Stage, task: &Task) -> String {
    match stage {
        Stage::Content => content_prompt(task),
        Stage::Rt => review_prompt(
            stage,
            task,
            "validar a precisão técnica de questões educacionais",
            &task.checklists().rt,
            &[
                "Analise cada questão quanto à precisão técnica do conteúdo.",
                "Verifique se as questões estão alinhadas com os objetivos de aprendizagem.",
                "Identifique e corrija erros técnicos ou conceituais.",
            ],
        ),
        Stage::De => review_prompt(
            stage,
            task,
            "validar a estrutura e a qualidade pedagógica de questões educacionais",
            &task.checklists().de,
            &[
                "Analise cada questão quanto à clareza, estrutura e qualidade pedagógica.",
                "Verifique se as questões seguem o modelo do seu tipo.",
                "Corrija problemas de redação, ambiguidades ou inconsistências.",
            ],
        ),
        Stage::Validator => validator_prompt(task),
    }
}

fn header(stage: Stage, expertise: &str) -> String {
    format!("Você é um {} especializado em {}.\n\n", stage.role_marker(), expertise)
}

fn content_prompt(task: &Task) -> String {
    let mut prompt = header(
        Stage::Content,
        "elaborar questões educacionais de alta qualidade",
    );

    prompt.push_str("OBJETIVOS DE APRENDIZAGEM:\n");
    for objective in task.objectives() {
        let _ = writeln!(prompt, "{}", objective);
    }

    let _ = write!(prompt, "\nFUNDAMENTAÇÃO TEÓRICA:\n{}\n\n", task.theory_text().trim());

    prompt.push_str("MODELOS DE QUESTÕES:\n");
    for kind in QuestionType::ALL {
        if let Some(template) = task.templates().get(&kind) {
            let _ = write!(prompt, "Modelo {}:\n{}\n\n", kind, template.trim());
        }
    }

    let _ = write!(
        prompt,
        "PALAVRAS A EVITAR (não use estas palavras ou similares):\n{}\n\n",
        task.stopwords().join(", ")
    );

    prompt.push_str(
        "INSTRUÇÕES:\n\
         1. Elabore UMA questão para CADA objetivo de aprendizagem fornecido.\n\
         2. Use o identificador do objetivo (por exemplo Obj.1) no campo objective_id.\n\
         3. Siga rigorosamente o formato dos modelos fornecidos.\n\
         4. Crie questões que avaliem compreensão e aplicação, não memorização.\n\
         5. Cada questão deve ter exatamente 5 alternativas (a, b, c, d, e) com extensão semelhante.\n\
         6. Forneça feedback para cada alternativa.\n\n\
         Responda com um único bloco JSON no formato {\"questions\": [...]}.\n",
    );
    prompt
}

fn questions_block(questions: &[Question]) -> String {
    let body = json!({ "questions": questions });
    let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    format!("```json\n{}\n```", pretty)
}

fn review_prompt(
    stage: Stage,
    task: &Task,
    expertise: &str,
    checklist: &str,
    steps: &[&str],
) -> String {
    let mut prompt = header(stage, expertise);

    let _ = write!(
        prompt,
        "QUESTÕES A SEREM REVISADAS:\n{}\n\n",
        questions_block(task.questions())
    );
    let _ = write!(prompt, "CHECKLIST DE VALIDAÇÃO {}:\n{}\n\n", stage.as_str().to_uppercase(), checklist.trim());
    let _ = write!(
        prompt,
        "PALAVRAS A EVITAR (verifique e substitua estas palavras ou similares):\n{}\n\n",
        task.stopwords().join(", ")
    );

    prompt.push_str("INSTRUÇÕES:\n");
    let mut n = 0;
    for step in steps.iter().copied().chain([
        "Substitua palavras restritivas por alternativas adequadas.",
        "Preencha o checklist de validação para cada questão.",
    ]) {
        n += 1;
        let _ = writeln!(prompt, "{}. {}", n, step);
    }

    let _ = write!(
        prompt,
        "\nRetorne as questões revisadas no mesmo formato JSON, mantendo o objective_id de cada uma. \
         Adicione em validation.{slot} um objeto com status (approved ou rejected), comments e \
         checklist, onde cada item do checklist tem result (sim, nao ou na) e observation.\n",
        slot = stage.as_str()
    );
    prompt
}

fn validator_prompt(task: &Task) -> String {
    let mut prompt = header(
        Stage::Validator,
        "garantir a qualidade geral de questões educacionais",
    );

    let _ = write!(
        prompt,
        "QUESTÕES A SEREM VALIDADAS:\n{}\n\n",
        questions_block(task.questions())
    );

    prompt.push_str(
        "INSTRUÇÕES:\n\
         1. Analise cada questão considerando as revisões técnica e pedagógica já realizadas.\n\
         2. Verifique se todas as questões estão completas e prontas para uso.\n\
         3. Adicione em validation.final o resultado da sua análise para cada questão.\n\n\
         Retorne, nesta ordem:\n\
         1. As questões validadas em um bloco JSON no mesmo formato.\n\
         2. Um bloco markdown iniciado pelo título \"# Relatório de Desenvolvimento\", com as seções \
         Resumo, Etapas do Processo e Recomendações para Melhoria do Prompt.\n\
         3. Um bloco markdown iniciado pelo título \"# Questões Validadas\", com uma seção por objetivo \
         contendo contextualização, enunciado, alternativas e feedback.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_records;
    use crate::materials::BuiltinSource;
    use crate::question::tests::sample_question;

    fn task() -> Task {
        let mut task = Task::new(
            vec![
                "Obj.1: Explicar o ciclo da água".to_string(),
                "Obj.2: Descrever a precipitação".to_string(),
            ],
            "A água evapora, condensa e precipita.".to_string(),
            BuiltinSource.materials(),
        )
        .unwrap();
        task.push_question(sample_question("Obj.1"));
        task
    }

    #[test]
    fn test_every_prompt_opens_with_its_role() {
        let task = task();
        for stage in Stage::ALL {
            let prompt = build_prompt(stage, &task);
            assert_eq!(Stage::detect(&prompt), Some(stage), "{}", stage);
        }
    }

    #[test]
    fn test_content_prompt_lists_objectives_and_stopwords() {
        let prompt = build_prompt(Stage::Content, &task());
        assert!(prompt.contains("\nObj.2: Descrever a precipitação\n"));
        assert!(prompt.contains("Modelo assertion_reason:"));
        assert!(prompt.contains(&task().stopwords()[0]));
    }

    #[test]
    fn test_review_prompt_embeds_only_the_questions() {
        let prompt = build_prompt(Stage::De, &task());
        let records = extract_records(&prompt);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["objective_id"], "Obj.1");
        assert!(prompt.contains("validation.de"));
        assert!(prompt.contains("CHECKLIST DE VALIDAÇÃO DE:"));
    }

    #[test]
    fn test_validator_prompt_names_both_sections() {
        let prompt = build_prompt(Stage::Validator, &task());
        assert!(prompt.contains("# Relatório de Desenvolvimento"));
        assert!(prompt.contains("# Questões Validadas"));
        assert_eq!(extract_records(&prompt).len(), 1);
    }
}
