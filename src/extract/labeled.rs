//! Last-resort strategy for responses written as labelled prose.
//!
//! ```text
//! Questão 1
//! Contextualização: ...
//! Enunciado: ...
//! Alternativas:
//! a) ...
//! Feedback:
//! a) Correta. ...
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::ExtractionStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Label {
    Context,
    Statement,
    Alternatives,
    Feedback,
}

impl Label {
    fn from_match(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.starts_with("context") {
            Label::Context
        } else if lower.starts_with("enunciado") || lower.starts_with("statement") {
            Label::Statement
        } else if lower.starts_with("altern") {
            Label::Alternatives
        } else {
            Label::Feedback
        }
    }
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:quest[ãa]o|question)\s+(\d+)").expect("header regex"))
}

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(contextualiza[çc][ãa]o|context|enunciado|statement|alternativas|alternatives|feedback)[\s*]*:",
        )
        .expect("label regex")
    })
}

fn alternative_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\**\s*([a-eA-E])\s*\)\s*\**\s*(.*)$").expect("alternative regex"))
}

fn feedback_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*\**\s*([a-e])\s*\)\s*\**\s*(correta|incorreta|correct|incorrect)\b\**\s*[.:\-]?\s*(.*)$",
        )
        .expect("feedback regex")
    })
}

fn clean(text: &str) -> String {
    text.trim_matches(|c: char| c == '*' || c.is_whitespace())
        .to_string()
}

/// `Question N` / `Questão N` sections with labelled sub-sections.
pub struct SectionPatternStrategy;

impl ExtractionStrategy for SectionPatternStrategy {
    fn name(&self) -> &'static str {
        "section_pattern"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        let headers: Vec<(usize, usize, String)> = header_regex()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps.get(1)?.as_str().to_string()))
            })
            .collect();

        let records: Vec<Value> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, (_, body_start, number))| {
                let body_end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
                parse_section(&text[*body_start..body_end], number).map(Value::Object)
            })
            .collect();

        if records.is_empty() {
            None
        } else {
            Some(Value::Array(records))
        }
    }
}

fn parse_section(section: &str, number: &str) -> Option<Map<String, Value>> {
    let labels: Vec<(usize, usize, Label)> = label_regex()
        .captures_iter(section)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), Label::from_match(caps.get(1)?.as_str())))
        })
        .collect();

    let mut parts: HashMap<Label, &str> = HashMap::new();
    for (i, (_, content_start, label)) in labels.iter().enumerate() {
        let content_end = labels.get(i + 1).map(|l| l.0).unwrap_or(section.len());
        parts.entry(*label).or_insert(&section[*content_start..content_end]);
    }

    let context = clean(parts.get(&Label::Context)?);
    let statement = clean(parts.get(&Label::Statement)?);
    let mut alternatives = parse_alternatives(parts.get(&Label::Alternatives)?);
    let feedback = parse_feedback(parts.get(&Label::Feedback)?, &mut alternatives);

    let mut record = Map::new();
    record.insert("objective_id".into(), json!(format!("Obj.{}", number)));
    record.insert("type".into(), json!("single_answer"));
    record.insert("context".into(), json!(context));
    record.insert("statement".into(), json!(statement));
    record.insert(
        "alternatives".into(),
        Value::Array(
            alternatives
                .into_iter()
                .map(|(id, text, correct)| json!({"id": id, "text": text, "correct": correct}))
                .collect(),
        ),
    );
    record.insert("feedback".into(), Value::Object(feedback));
    Some(record)
}

fn parse_alternatives(block: &str) -> Vec<(String, String, bool)> {
    let mut alternatives: Vec<(String, String, bool)> = Vec::new();
    for line in block.lines() {
        if let Some(caps) = alternative_regex().captures(line) {
            alternatives.push((caps[1].to_lowercase(), clean(&caps[2]), false));
        } else if let Some(last) = alternatives.last_mut() {
            let extra = clean(line);
            if !extra.is_empty() {
                last.1.push(' ');
                last.1.push_str(&extra);
            }
        }
    }
    alternatives
}

fn parse_feedback(
    block: &str,
    alternatives: &mut [(String, String, bool)],
) -> Map<String, Value> {
    let mut feedback: Vec<(String, String)> = Vec::new();
    for line in block.lines() {
        if let Some(caps) = feedback_regex().captures(line) {
            let letter = caps[1].to_lowercase();
            let status = caps[2].to_string();
            let justification = clean(&caps[3]);

            if matches!(status.to_lowercase().as_str(), "correta" | "correct") {
                if let Some(alt) = alternatives.iter_mut().find(|a| a.0 == letter) {
                    alt.2 = true;
                }
            }
            let value = if justification.is_empty() {
                format!("{}.", status)
            } else {
                format!("{}. {}", status, justification)
            };
            feedback.push((letter, value));
        } else if let Some(last) = feedback.last_mut() {
            let extra = clean(line);
            if !extra.is_empty() {
                last.1.push(' ');
                last.1.push_str(&extra);
            }
        }
    }
    feedback
        .into_iter()
        .map(|(letter, text)| (letter, Value::String(text)))
        .collect()
}
