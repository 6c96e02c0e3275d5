//! Question domain model.
//!
//! A `Question` is built from an extracted record at the `from_record`
//! boundary. Construction only checks that the required fields exist and have
//! a usable shape; deeper rules live in `check_compliance`, which never fails.

mod compliance;
mod markdown;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::extract::Record;
use crate::store::now_string;
use crate::task::Stage;

pub use compliance::{check_compliance, ComplianceReport};
pub use markdown::render_document;

/// The three supported question formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleAnswer,
    MultipleAnswer,
    AssertionReason,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::SingleAnswer,
        QuestionType::MultipleAnswer,
        QuestionType::AssertionReason,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleAnswer => "single_answer",
            QuestionType::MultipleAnswer => "multiple_answer",
            QuestionType::AssertionReason => "assertion_reason",
        }
    }

    /// Number of assertions a compliant question of this type carries.
    pub fn expected_assertions(&self) -> usize {
        match self {
            QuestionType::SingleAnswer => 0,
            QuestionType::MultipleAnswer => 4,
            QuestionType::AssertionReason => 2,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single_answer" => Ok(QuestionType::SingleAnswer),
            "multiple_answer" => Ok(QuestionType::MultipleAnswer),
            "assertion_reason" => Ok(QuestionType::AssertionReason),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// One answer option (`a` to `e`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// A numbered statement judged independently of the alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[serde(alias = "aprovado", alias = "aprovada")]
    Approved,
    #[serde(alias = "rejeitado", alias = "rejeitada")]
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Approved => "approved",
            ValidationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistResult {
    #[serde(alias = "yes")]
    Sim,
    #[serde(alias = "não", alias = "no")]
    Nao,
    #[serde(alias = "n/a")]
    Na,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub result: ChecklistResult,
    #[serde(default)]
    pub observation: String,
}

/// The verdict of one review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub checklist: BTreeMap<String, ChecklistEntry>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Which review slot an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Rt,
    De,
    Final,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Rt => "rt",
            ValidationKind::De => "de",
            ValidationKind::Final => "final",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub rt: Option<ValidationOutcome>,
    #[serde(default)]
    pub de: Option<ValidationOutcome>,
    #[serde(default, rename = "final")]
    pub final_review: Option<ValidationOutcome>,
}

impl Validation {
    pub fn get(&self, kind: ValidationKind) -> Option<&ValidationOutcome> {
        match kind {
            ValidationKind::Rt => self.rt.as_ref(),
            ValidationKind::De => self.de.as_ref(),
            ValidationKind::Final => self.final_review.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: ValidationKind) -> &mut Option<ValidationOutcome> {
        match kind {
            ValidationKind::Rt => &mut self.rt,
            ValidationKind::De => &mut self.de,
            ValidationKind::Final => &mut self.final_review,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub created_by: String,
    pub last_modified_by: String,
    pub creation_date: String,
    pub last_modified: String,
}

impl QuestionMetadata {
    fn fresh(stage: Stage) -> Self {
        let now = now_string();
        Self {
            created_by: stage.to_string(),
            last_modified_by: stage.to_string(),
            creation_date: now.clone(),
            last_modified: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub objective_id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub context: String,
    pub statement: String,
    pub alternatives: Vec<Alternative>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    pub feedback: BTreeMap<String, String>,
    pub metadata: QuestionMetadata,
    #[serde(default)]
    pub validation: Validation,
}

/// A record that cannot become a `Question`.
///
/// Never escapes a stage: the record is dropped and the others proceed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedRecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is unusable: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl Question {
    /// Promote an extracted record to a `Question`.
    ///
    /// Required: `objective_id` (or `objectiveId`), `type`, `context`,
    /// `statement`, `alternatives`, `feedback`. `metadata` and `validation`
    /// are kept when well-formed, otherwise fresh ones are stamped with `stage`.
    pub fn from_record(record: &Record, stage: Stage) -> Result<Self, MalformedRecordError> {
        let objective_id = required_text(record, &["objective_id", "objectiveId"], "objective_id")?;

        let kind_raw = required_text(record, &["type"], "type")?;
        let kind = kind_raw
            .parse::<QuestionType>()
            .map_err(|reason| MalformedRecordError::InvalidField {
                field: "type",
                reason,
            })?;

        let context = required_text(record, &["context"], "context")?;
        let statement = required_text(record, &["statement"], "statement")?;

        let alternatives: Vec<Alternative> = typed_field(record, "alternatives")?
            .ok_or(MalformedRecordError::MissingField("alternatives"))?;
        let feedback = feedback_field(record)?;
        let assertions: Vec<Assertion> = typed_field(record, "assertions")?.unwrap_or_default();

        let id = match record.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            _ => short_id(),
        };

        let metadata = match present(record, "metadata") {
            Some(value) => serde_json::from_value(value.clone())
                .unwrap_or_else(|_| QuestionMetadata::fresh(stage)),
            None => QuestionMetadata::fresh(stage),
        };

        Ok(Self {
            id,
            objective_id,
            kind,
            context,
            statement,
            alternatives,
            assertions,
            feedback,
            metadata,
            validation: validation_field(record),
        })
    }

    /// Stamp `last_modified_by` and `last_modified`.
    pub fn touch(&mut self, stage: Stage) {
        self.metadata.last_modified_by = stage.to_string();
        self.metadata.last_modified = now_string();
    }

    /// Store a review verdict, stamping it if it carries no timestamp.
    pub fn add_validation(&mut self, kind: ValidationKind, mut outcome: ValidationOutcome, stage: Stage) {
        if outcome.timestamp.is_none() {
            outcome.timestamp = Some(now_string());
        }
        *self.validation.slot_mut(kind) = Some(outcome);
        self.touch(stage);
    }

    /// The alternatives flagged as correct.
    pub fn correct_alternatives(&self) -> impl Iterator<Item = &Alternative> {
        self.alternatives.iter().filter(|a| a.correct)
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A field counts as present only when it is not `null`.
fn present<'a>(record: &'a Record, key: &str) -> Option<&'a Value> {
    record.get(key).filter(|v| !v.is_null())
}

fn required_text(
    record: &Record,
    keys: &[&str],
    field: &'static str,
) -> Result<String, MalformedRecordError> {
    let value = keys
        .iter()
        .find_map(|key| present(record, key))
        .ok_or(MalformedRecordError::MissingField(field))?;
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(MalformedRecordError::InvalidField {
            field,
            reason: format!("expected text, found {}", json_kind(other)),
        }),
    }
}

fn typed_field<T: serde::de::DeserializeOwned>(
    record: &Record,
    field: &'static str,
) -> Result<Option<T>, MalformedRecordError> {
    match present(record, field) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| MalformedRecordError::InvalidField {
                field,
                reason: e.to_string(),
            }),
    }
}

fn feedback_field(record: &Record) -> Result<BTreeMap<String, String>, MalformedRecordError> {
    let value = present(record, "feedback").ok_or(MalformedRecordError::MissingField("feedback"))?;
    let Value::Object(map) = value else {
        return Err(MalformedRecordError::InvalidField {
            field: "feedback",
            reason: format!("expected an object, found {}", json_kind(value)),
        });
    };

    let mut feedback = BTreeMap::new();
    for (key, text) in map {
        match text {
            Value::String(s) => {
                feedback.insert(key.clone(), s.clone());
            }
            other => {
                return Err(MalformedRecordError::InvalidField {
                    field: "feedback",
                    reason: format!("entry '{}' is {}, not text", key, json_kind(other)),
                })
            }
        }
    }
    Ok(feedback)
}

/// Lenient: each slot that fails to parse is reset to empty with a warning.
fn validation_field(record: &Record) -> Validation {
    let Some(Value::Object(map)) = present(record, "validation") else {
        return Validation::default();
    };

    let outcome = |key: &str| -> Option<ValidationOutcome> {
        let value = map.get(key).filter(|v| !v.is_null())?;
        match serde_json::from_value(value.clone()) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(slot = key, error = %e, "Ignoring malformed validation entry");
                None
            }
        }
    };

    Validation {
        rt: outcome("rt"),
        de: outcome("de"),
        final_review: outcome("final"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Accept `"1"` as well as `1` for ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected an id, found {}",
            json_kind(&other)
        ))),
    }
}
