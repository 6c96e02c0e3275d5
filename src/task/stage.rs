//! Pipeline stages.

use serde::{Deserialize, Serialize};

/// One phase of the four-phase workflow.
///
/// # Ordering
/// ```text
/// Content -> Rt -> De -> Validator
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Drafts one question per learning objective
    Content,
    /// Technical review (revisor técnico)
    Rt,
    /// Educational design review (design educacional)
    De,
    /// Final validation, report and document
    Validator,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Content, Stage::Rt, Stage::De, Stage::Validator];

    /// Stable lowercase name, also used as `current_agent`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Content => "content",
            Stage::Rt => "rt",
            Stage::De => "de",
            Stage::Validator => "validator",
        }
    }

    /// The stage that must have completed before this one may run.
    pub fn predecessor(&self) -> Option<Stage> {
        match self {
            Stage::Content => None,
            Stage::Rt => Some(Stage::Content),
            Stage::De => Some(Stage::Rt),
            Stage::Validator => Some(Stage::De),
        }
    }

    /// The stage that follows this one, if any.
    pub fn successor(&self) -> Option<Stage> {
        match self {
            Stage::Content => Some(Stage::Rt),
            Stage::Rt => Some(Stage::De),
            Stage::De => Some(Stage::Validator),
            Stage::Validator => None,
        }
    }

    /// Review stages replace questions instead of appending them.
    pub fn is_review(&self) -> bool {
        matches!(self, Stage::Rt | Stage::De)
    }

    /// Role phrase that opens every prompt built for this stage.
    ///
    /// The stand-in service uses it to recognise which stage is asking.
    pub fn role_marker(&self) -> &'static str {
        match self {
            Stage::Content => "Professor-Conteudista",
            Stage::Rt => "Revisor Técnico",
            Stage::De => "Designer Educacional",
            Stage::Validator => "Validador Final",
        }
    }

    /// Find the stage whose role marker appears first in a prompt.
    pub fn detect(prompt: &str) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .filter_map(|stage| prompt.find(stage.role_marker()).map(|pos| (pos, stage)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, stage)| stage)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" | "content_agent" => Ok(Stage::Content),
            "rt" | "rt_agent" => Ok(Stage::Rt),
            "de" | "de_agent" => Ok(Stage::De),
            "validator" | "validator_agent" => Ok(Stage::Validator),
            other => Err(format!("Unknown stage: {}", other)),
        }
    }
}
