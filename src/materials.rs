//! Question templates, restricted terms and review checklists.
//!
//! Materials are loaded once when a task is created and copied into it.
//! `DirectorySource` reads them from disk and falls back to the built-ins for
//! anything missing, so loading never fails.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::question::QuestionType;

/// Built-in restricted terms.
pub const BUILTIN_STOPWORDS: &[&str] = &[
    "limita-se",
    "estritamente",
    "apenas",
    "exclusivamente",
    "somente",
    "unicamente",
    "restritivamente",
    "rigorosamente",
    "especificamente",
    "exatamente",
    "precisamente",
    "unilateralmente",
    "singularmente",
    "determinadamente",
    "explicitamente",
    "meramente",
    "unicidade",
    "nada além de",
    "só isso",
    "e somente isso",
    "de forma exclusiva",
    "de modo restrito",
    "de maneira limitada",
    "sem exceções",
];

const SINGLE_ANSWER_TEMPLATE: &str = r#"{
  "type": "single_answer",
  "context": "Texto de contextualização da questão...",
  "statement": "Enunciado da questão...",
  "alternatives": [
    {"id": "a", "text": "Alternativa A", "correct": true},
    {"id": "b", "text": "Alternativa B", "correct": false},
    {"id": "c", "text": "Alternativa C", "correct": false},
    {"id": "d", "text": "Alternativa D", "correct": false},
    {"id": "e", "text": "Alternativa E", "correct": false}
  ],
  "feedback": {
    "a": "Correta. Justificativa para A...",
    "b": "Incorreta. Justificativa para B...",
    "c": "Incorreta. Justificativa para C...",
    "d": "Incorreta. Justificativa para D...",
    "e": "Incorreta. Justificativa para E..."
  }
}"#;

const MULTIPLE_ANSWER_TEMPLATE: &str = r#"{
  "type": "multiple_answer",
  "context": "Texto de contextualização da questão...",
  "statement": "Considerando o texto, avalie as afirmativas a seguir.",
  "assertions": [
    {"id": "I", "text": "Afirmativa I", "correct": true},
    {"id": "II", "text": "Afirmativa II", "correct": false},
    {"id": "III", "text": "Afirmativa III", "correct": true},
    {"id": "IV", "text": "Afirmativa IV", "correct": false}
  ],
  "alternatives": [
    {"id": "a", "text": "I e III.", "correct": true},
    {"id": "b", "text": "II e IV.", "correct": false},
    {"id": "c", "text": "I, II e III.", "correct": false},
    {"id": "d", "text": "II, III e IV.", "correct": false},
    {"id": "e", "text": "I, II, III e IV.", "correct": false}
  ],
  "feedback": {
    "a": "Correta. Justificativa para A...",
    "b": "Incorreta. Justificativa para B...",
    "c": "Incorreta. Justificativa para C...",
    "d": "Incorreta. Justificativa para D...",
    "e": "Incorreta. Justificativa para E..."
  }
}"#;

const ASSERTION_REASON_TEMPLATE: &str = r#"{
  "type": "assertion_reason",
  "context": "Texto de contextualização da questão...",
  "statement": "Avalie as asserções a seguir e a relação proposta entre elas.",
  "assertions": [
    {"id": "I", "text": "Asserção I", "correct": true},
    {"id": "II", "text": "Asserção II (PORQUE)", "correct": true}
  ],
  "alternatives": [
    {"id": "a", "text": "As asserções I e II são verdadeiras, e a II é uma justificativa correta da I.", "correct": true},
    {"id": "b", "text": "As asserções I e II são verdadeiras, mas a II não é uma justificativa correta da I.", "correct": false},
    {"id": "c", "text": "A asserção I é verdadeira, e a II é falsa.", "correct": false},
    {"id": "d", "text": "A asserção I é falsa, e a II é verdadeira.", "correct": false},
    {"id": "e", "text": "As asserções I e II são falsas.", "correct": false}
  ],
  "feedback": {
    "a": "Correta. Justificativa para A...",
    "b": "Incorreta. Justificativa para B...",
    "c": "Incorreta. Justificativa para C...",
    "d": "Incorreta. Justificativa para D...",
    "e": "Incorreta. Justificativa para E..."
  }
}"#;

const RT_CHECKLIST: &str = "CHECKLIST - REVISOR TÉCNICO

| Nº | Item | Sim | Não | NA | Observação |
|---|---|---|---|---|---|
| 1 | As questões abordam os conteúdos tratados no texto de referência? | | | | |
| 2 | Os objetivos de aprendizagem indicados correspondem aos definidos para a disciplina? | | | | |
| 3 | Cada questão permite avaliar a aprendizagem a partir do objetivo associado? | | | | |
| 4 | Há correlação entre os conteúdos desenvolvidos e as questões? | | | | |
| 5 | O nível de complexidade é coerente com os conteúdos propostos? | | | | |
| 6 | Os feedbacks justificam o acerto ou o erro de forma clara? | | | | |
| 7 | O texto-base e o enunciado estão claros e sem ambiguidades? | | | | |
| 8 | As questões evitam avaliar conteúdos memorizados? | | | | |
";

const DE_CHECKLIST: &str = "CHECKLIST - DESIGN EDUCACIONAL

| Nº | Item | Sim | Não | NA | Observação |
|---|---|---|---|---|---|
| 1 | A contextualização apresenta uma situação-problema relevante? | | | | |
| 2 | O enunciado está redigido de forma afirmativa e objetiva? | | | | |
| 3 | As alternativas têm extensão e estrutura gramatical semelhantes? | | | | |
| 4 | Os distratores são plausíveis? | | | | |
| 5 | A questão está livre de termos restritivos e pistas para a resposta? | | | | |
| 6 | O feedback de cada alternativa é formativo? | | | | |
| 7 | A linguagem é adequada ao público-alvo? | | | | |
| 8 | A formatação segue o modelo do tipo de questão? | | | | |
";

/// Checklists handed to the two review stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklists {
    pub rt: String,
    pub de: String,
}

impl Default for Checklists {
    fn default() -> Self {
        Self {
            rt: RT_CHECKLIST.to_string(),
            de: DE_CHECKLIST.to_string(),
        }
    }
}

/// Everything a task needs besides its objectives and theory.
#[derive(Debug, Clone, Default)]
pub struct Materials {
    pub templates: BTreeMap<QuestionType, String>,
    pub stopwords: Vec<String>,
    pub checklists: Checklists,
}

/// Where materials come from.
#[async_trait]
pub trait MaterialSource: Send + Sync {
    async fn load(&self) -> Materials;
}

/// Built-in template for a question type.
pub fn builtin_template(kind: QuestionType) -> &'static str {
    match kind {
        QuestionType::SingleAnswer => SINGLE_ANSWER_TEMPLATE,
        QuestionType::MultipleAnswer => MULTIPLE_ANSWER_TEMPLATE,
        QuestionType::AssertionReason => ASSERTION_REASON_TEMPLATE,
    }
}

/// Trim, drop blanks and keep the first spelling of each term.
fn dedup_terms<'a>(terms: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Always returns the built-in materials.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl BuiltinSource {
    pub fn materials(&self) -> Materials {
        Materials {
            templates: QuestionType::ALL
                .into_iter()
                .map(|kind| (kind, builtin_template(kind).to_string()))
                .collect(),
            stopwords: dedup_terms(BUILTIN_STOPWORDS.iter().copied()),
            checklists: Checklists::default(),
        }
    }
}

#[async_trait]
impl MaterialSource for BuiltinSource {
    async fn load(&self) -> Materials {
        self.materials()
    }
}

/// Reads materials from disk.
///
/// ```text
/// templates_dir/single_answer.json
/// templates_dir/multiple_answer.json
/// templates_dir/assertion_reason.json
/// data_dir/stopwords.txt       one term per line
/// data_dir/validacao_rt.txt
/// data_dir/validacao_de.txt
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    templates_dir: PathBuf,
    data_dir: PathBuf,
}

impl DirectorySource {
    pub fn new(templates_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Contents of a non-empty file, or `None` with the reason logged.
    async fn read_optional(path: &Path) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                debug!(path = %path.display(), "Material file is empty, using built-in");
                None
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Material file not found, using built-in");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read material file, using built-in");
                None
            }
        }
    }
}

#[async_trait]
impl MaterialSource for DirectorySource {
    async fn load(&self) -> Materials {
        let mut templates = BTreeMap::new();
        for kind in QuestionType::ALL {
            let path = self.templates_dir.join(format!("{}.json", kind));
            let text = Self::read_optional(&path)
                .await
                .unwrap_or_else(|| builtin_template(kind).to_string());
            templates.insert(kind, text);
        }

        let stopwords = Self::read_optional(&self.data_dir.join("stopwords.txt"))
            .await
            .map(|text| dedup_terms(text.lines()))
            .filter(|terms| !terms.is_empty())
            .unwrap_or_else(|| dedup_terms(BUILTIN_STOPWORDS.iter().copied()));

        let builtin = Checklists::default();
        let checklists = Checklists {
            rt: Self::read_optional(&self.data_dir.join("validacao_rt.txt"))
                .await
                .unwrap_or(builtin.rt),
            de: Self::read_optional(&self.data_dir.join("validacao_de.txt"))
                .await
                .unwrap_or(builtin.de),
        };

        Materials {
            templates,
            stopwords,
            checklists,
        }
    }
}
