//! Structured-record extraction from free text returned by the generative service.
//!
//! Responses mix prose, Markdown and JSON. Extraction runs an ordered list of
//! strategies and the first one that produces a value wins; results are never
//! merged across strategies.
//!
//! ```text
//! raw text ──► FencedBlock ──► BraceSpan ──► SectionPattern
//!                  │               │               │
//!                  └──── first success ────────────┘
//!                              │
//!                          normalize ──► Vec<Record>
//! ```

mod fenced;
mod labeled;
mod markdown;
mod objectives;

use serde_json::{Map, Value};
use tracing::debug;

pub use fenced::{fenced_blocks, BraceSpanStrategy, FencedBlock, FencedBlockStrategy};
pub use labeled::SectionPatternStrategy;
pub use markdown::{
    development_report, find_labeled_section, validated_questions, DEVELOPMENT_REPORT_HEADINGS,
    VALIDATED_QUESTIONS_HEADINGS,
};
pub use objectives::parse_objectives;

/// One extracted object, before it is promoted to a domain type.
pub type Record = Map<String, Value>;

/// A way of recovering a JSON value from raw text.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return a value, or `None` to let the next strategy try.
    fn extract(&self, text: &str) -> Option<Value>;
}

/// Ordered list of strategies.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FencedBlockStrategy),
            Box::new(BraceSpanStrategy),
            Box::new(SectionPatternStrategy),
        ])
    }
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the strategies in order. An empty result means nothing usable was found.
    pub fn extract_records(&self, text: &str) -> Vec<Record> {
        for strategy in &self.strategies {
            if let Some(value) = strategy.extract(text) {
                let records = normalize(value);
                debug!(
                    strategy = strategy.name(),
                    records = records.len(),
                    "Extraction strategy matched"
                );
                return records;
            }
        }
        debug!(chars = text.len(), "No extraction strategy matched");
        Vec::new()
    }
}

/// Extract records with the default strategy list.
pub fn extract_records(text: &str) -> Vec<Record> {
    Extractor::default().extract_records(text)
}

/// Unwrap `{"questions": [...]}`, wrap a lone object, keep only objects.
pub fn normalize(value: Value) -> Vec<Record> {
    let items = match value {
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("questions".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_single_fence_unwraps_questions() {
        let text = "Segue o resultado:\n```json\n{\"questions\": [{\"objective_id\": \"Obj.1\"}, {\"objective_id\": \"Obj.2\"}]}\n```\nObrigado.";
        let records = extract_records(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["objective_id"], "Obj.1");
        assert_eq!(records[1]["objective_id"], "Obj.2");
    }

    #[test]
    fn test_longer_fence_wins_regardless_of_order() {
        let short = "```json\n{\"objective_id\": \"short\"}\n```";
        let long = "```json\n{\"objective_id\": \"long\", \"context\": \"much longer body here\"}\n```";

        for text in [format!("{short}\n{long}"), format!("{long}\n{short}")] {
            let records = extract_records(&text);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["objective_id"], "long");
        }
    }

    #[test]
    fn test_malformed_fence_falls_through_to_brace_span() {
        let text = "```json\n{ not json\n```\nresult: {\"objective_id\": \"Obj.9\"}";
        // The brace span covers from the fence's '{' to the last '}', which does not parse,
        // so the section pattern is tried next and finds nothing.
        assert!(extract_records(text).is_empty());

        let text = "Resposta: {\"objective_id\": \"Obj.9\", \"type\": \"single_answer\"} fim";
        let records = extract_records(text);
        assert_eq!(records[0]["objective_id"], "Obj.9");
    }

    #[test]
    fn test_plain_prose_is_empty() {
        assert!(extract_records("Não consegui gerar as questões hoje.").is_empty());
        assert!(extract_records("").is_empty());
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(normalize(json!({"a": 1})).len(), 1);
        assert_eq!(normalize(json!([{"a": 1}, 2, "x", {"b": 2}])).len(), 2);
        assert!(normalize(json!("text")).is_empty());
        assert!(normalize(json!({"questions": []})).is_empty());
        // a non-list `questions` field is ordinary data
        let records = normalize(json!({"questions": "none", "id": "x"}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["questions"], "none");
    }

    struct Fixed(Option<Value>);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self, _text: &str) -> Option<Value> {
            self.0.clone()
        }
    }

    #[test]
    fn test_first_success_wins_without_merging() {
        let extractor = Extractor::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(json!({"from": "second"})))),
            Box::new(Fixed(Some(json!([{"from": "third"}, {"from": "third"}])))),
        ]);
        let records = extractor.extract_records("anything");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["from"], "second");
    }

    fn fence(objective_id: &str, context: &str) -> String {
        format!("```json\n{{\"objective_id\": \"{objective_id}\", \"context\": \"{context}\"}}\n```")
    }

    proptest! {
        #[test]
        fn prop_longer_fence_wins_in_either_order(
            first in "[a-z ]{0,40}",
            second in "[a-z ]{0,40}",
            longer_first in any::<bool>(),
        ) {
            prop_assume!(first.len() != second.len());
            let (long, short) = if first.len() > second.len() {
                (fence("long", &first), fence("tiny", &second))
            } else {
                (fence("long", &second), fence("tiny", &first))
            };
            let text = if longer_first {
                format!("Resposta:\n{long}\ne também\n{short}\n")
            } else {
                format!("Resposta:\n{short}\ne também\n{long}\n")
            };

            let records = extract_records(&text);
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(records[0]["objective_id"].as_str(), Some("long"));
        }
    }
}
