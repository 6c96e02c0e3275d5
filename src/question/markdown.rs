//! Markdown rendering, used when the validator returns no document of its own.

use std::fmt::Write;

use super::{Question, QuestionType};

impl Question {
    /// Render the question as a Markdown section headed by its objective.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("## {}\n\n", self.objective_id);

        let title = match self.kind {
            QuestionType::SingleAnswer => "Resposta Única",
            QuestionType::MultipleAnswer => "Resposta Múltipla",
            QuestionType::AssertionReason => "Asserção-Razão",
        };
        let _ = write!(md, "### Questão ({})\n\n", title);
        let _ = write!(md, "**Contextualização:**\n{}\n\n", self.context);
        let _ = write!(md, "**Enunciado:**\n{}\n\n", self.statement);

        match self.kind {
            QuestionType::SingleAnswer => {
                md.push_str("**Alternativas:**\n");
            }
            QuestionType::MultipleAnswer => {
                md.push_str("**Afirmativas:**\n");
                for assertion in &self.assertions {
                    let _ = writeln!(md, "{}. {}", assertion.id, assertion.text);
                }
                md.push_str("\n**É correto apenas o que se afirma em:**\n");
            }
            QuestionType::AssertionReason => {
                if let [first, second, ..] = self.assertions.as_slice() {
                    let _ = write!(md, "**Asserção I:**\n{}\n\n", first.text);
                    md.push_str("**PORQUE**\n\n");
                    let _ = write!(md, "**Asserção II:**\n{}\n\n", second.text);
                }
                md.push_str("**A respeito dessas asserções, assinale a opção correta:**\n");
            }
        }

        for alternative in &self.alternatives {
            let _ = writeln!(md, "{}) {}", alternative.id, alternative.text);
        }

        md.push_str("\n**Feedback:**\n");
        for alternative in &self.alternatives {
            if let Some(text) = self.feedback.get(&alternative.id) {
                let _ = writeln!(md, "{}) {}", alternative.id, text);
            }
        }

        md
    }
}

/// Render a full document for a list of questions.
pub fn render_document(questions: &[Question]) -> String {
    let mut md = String::from("# Questões Validadas\n\n");
    for question in questions {
        md.push_str(&question.to_markdown());
        md.push('\n');
    }
    md
}
