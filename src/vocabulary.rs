//! Restricted-vocabulary scanning and rewriting.
//!
//! Question text must not contain restrictive terms ("apenas", "somente", ...).
//! Every match is replaced by a fixed substitute from a `ReplacementTable`,
//! keeping the case pattern of the matched text.
//!
//! # Invariants
//! - `scan` offsets are byte offsets into the original text, ascending
//! - one rewrite pass replaces each region of text at most once
//! - `rewrite` repeats passes until `scan` finds nothing, so with a table
//!   that passes `ReplacementTable::verified` it is idempotent

use std::collections::{HashMap, HashSet};

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::Record;

/// Substitute used for stopwords without a table entry.
pub const GENERIC_SUBSTITUTE: &str = "principalmente";

/// Built-in substitutes, keyed by lowercase stopword.
pub const BUILTIN_REPLACEMENTS: &[(&str, &str)] = &[
    ("limita-se", "abrange"),
    ("estritamente", "adequadamente"),
    ("apenas", "principalmente"),
    ("exclusivamente", "especialmente"),
    ("somente", "preferencialmente"),
    ("unicamente", "particularmente"),
    ("restritivamente", "apropriadamente"),
    ("rigorosamente", "cuidadosamente"),
    ("especificamente", "notadamente"),
    ("exatamente", "com exatidão"),
    ("precisamente", "detalhadamente"),
    ("unilateralmente", "diretamente"),
    ("singularmente", "distintamente"),
    ("determinadamente", "consistentemente"),
    ("explicitamente", "claramente"),
    ("meramente", "basicamente"),
    ("unicidade", "característica"),
    ("nada além de", "principalmente"),
    ("só isso", "isso"),
    ("e somente isso", "entre outros aspectos"),
    ("de forma exclusiva", "de forma destacada"),
    ("de modo restrito", "de modo específico"),
    ("de maneira limitada", "de maneira particular"),
    ("sem exceções", "em geral"),
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VocabularyError {
    #[error("substitute '{substitute}' for '{term}' contains the stopword '{stopword}'")]
    SubstituteIsStopword {
        term: String,
        substitute: String,
        stopword: String,
    },
}

/// One occurrence of a stopword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The stopword as configured
    pub term: String,
    /// Byte offset of the match in the scanned text
    pub offset: usize,
    /// Byte length of the matched text
    pub len: usize,
}

impl Match {
    fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Stopword to substitute mapping.
#[derive(Debug, Clone)]
pub struct ReplacementTable {
    entries: HashMap<String, String>,
    generic: String,
}

impl Default for ReplacementTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReplacementTable {
    /// The built-in table. Checked against the built-in stopwords in tests.
    pub fn builtin() -> Self {
        Self::unchecked(
            BUILTIN_REPLACEMENTS
                .iter()
                .map(|(term, sub)| (term.to_string(), sub.to_string())),
        )
    }

    /// Build a table, rejecting any substitute that contains one of `stopwords`.
    pub fn verified(
        entries: impl IntoIterator<Item = (String, String)>,
        stopwords: &[String],
    ) -> Result<Self, VocabularyError> {
        let table = Self::unchecked(entries);
        table.verify(stopwords)?;
        Ok(table)
    }

    fn unchecked(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(term, sub)| (term.to_lowercase(), sub))
                .collect(),
            generic: GENERIC_SUBSTITUTE.to_string(),
        }
    }

    /// Check every substitute, the generic one included, against `stopwords`.
    pub fn verify(&self, stopwords: &[String]) -> Result<(), VocabularyError> {
        let substitutes = self
            .entries
            .iter()
            .map(|(term, sub)| (term.as_str(), sub.as_str()))
            .chain(std::iter::once(("*", self.generic.as_str())));

        for (term, substitute) in substitutes {
            let lower = substitute.to_lowercase();
            if let Some(stopword) = stopwords
                .iter()
                .map(|s| s.trim())
                .find(|s| !s.is_empty() && lower.contains(&s.to_lowercase()))
            {
                return Err(VocabularyError::SubstituteIsStopword {
                    term: term.to_string(),
                    substitute: substitute.to_string(),
                    stopword: stopword.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Substitute for `term`, falling back to the generic one.
    pub fn substitute(&self, term: &str) -> &str {
        self.entries
            .get(&term.to_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.generic)
    }
}

/// Give `substitute` the case pattern of `matched`.
fn match_case(matched: &str, substitute: &str) -> String {
    let letters: Vec<char> = matched.chars().filter(|c| c.is_alphabetic()).collect();
    let lower = substitute.to_lowercase();

    match letters.first() {
        Some(_) if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) => {
            substitute.to_uppercase()
        }
        Some(first) if first.is_uppercase() => {
            let mut chars = lower.chars();
            match chars.next() {
                Some(head) => head.to_uppercase().chain(chars).collect(),
                None => lower,
            }
        }
        _ => lower,
    }
}

/// Compiled matchers for one stopword list.
pub struct VocabularyFilter {
    matchers: Vec<(String, Regex)>,
    table: ReplacementTable,
}

impl VocabularyFilter {
    pub fn new(stopwords: &[String], table: &ReplacementTable) -> Self {
        let mut seen = HashSet::new();
        let mut matchers = Vec::new();
        for term in stopwords.iter().map(|s| s.trim()) {
            if term.is_empty() || !seen.insert(term.to_lowercase()) {
                continue;
            }
            match RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
            {
                Ok(regex) => matchers.push((term.to_string(), regex)),
                Err(e) => warn!(term = %term, error = %e, "Skipping unusable stopword"),
            }
        }
        Self {
            matchers,
            table: table.clone(),
        }
    }

    /// Every occurrence of every stopword, ascending by offset.
    ///
    /// Overlapping matches of different stopwords are all kept; at equal
    /// offsets the longer match comes first.
    pub fn scan(&self, text: &str) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .matchers
            .iter()
            .flat_map(|(term, regex)| {
                regex.find_iter(text).map(move |m| Match {
                    term: term.clone(),
                    offset: m.start(),
                    len: m.len(),
                })
            })
            .collect();
        matches.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.len.cmp(&a.len)));
        matches
    }

    /// Replace every stopword occurrence, leftmost-longest on overlaps.
    ///
    /// A substitute can join with its neighbours into a new occurrence
    /// ("só só isso" becomes "só isso"), so passes repeat until none is left.
    pub fn rewrite(&self, text: &str) -> String {
        let max_passes = self.matchers.len() + 1;
        let mut result = text.to_string();
        for pass in 1..=max_passes {
            match self.rewrite_pass(&result) {
                Some(next) => {
                    debug!(pass, "Rewrote restricted terms");
                    result = next;
                }
                None => return result,
            }
        }
        let left = self.scan(&result);
        if !left.is_empty() {
            warn!(
                passes = max_passes,
                left = left.len(),
                "Restricted terms remain after rewriting"
            );
        }
        result
    }

    /// One leftmost-longest pass. `None` when nothing matched.
    fn rewrite_pass(&self, text: &str) -> Option<String> {
        let mut kept: Vec<Match> = Vec::new();
        for m in self.scan(text) {
            if kept.last().map_or(true, |last| m.offset >= last.end()) {
                kept.push(m);
            }
        }
        if kept.is_empty() {
            return None;
        }

        let mut result = text.to_string();
        for m in kept.iter().rev() {
            let matched = &text[m.offset..m.end()];
            let substitute = match_case(matched, self.table.substitute(&m.term));
            result.replace_range(m.offset..m.end(), &substitute);
        }
        Some(result)
    }

    /// Rewrite the free-text fields of a record in place.
    ///
    /// Returns how many fields changed.
    pub fn sanitize_record(&self, record: &mut Record) -> usize {
        let mut changed = 0;
        for key in ["context", "statement"] {
            if let Some(value) = record.get_mut(key) {
                changed += self.sanitize_value(value);
            }
        }
        for key in ["alternatives", "assertions"] {
            if let Some(Value::Array(items)) = record.get_mut(key) {
                for item in items.iter_mut() {
                    if let Some(text) = item.get_mut("text") {
                        changed += self.sanitize_value(text);
                    }
                }
            }
        }
        if let Some(Value::Object(feedback)) = record.get_mut("feedback") {
            for value in feedback.values_mut() {
                changed += self.sanitize_value(value);
            }
        }
        changed
    }

    fn sanitize_value(&self, value: &mut Value) -> usize {
        if let Value::String(text) = value {
            let rewritten = self.rewrite(text);
            if rewritten != *text {
                *text = rewritten;
                return 1;
            }
        }
        0
    }
}

/// Scan `text` for `stopwords`.
pub fn scan(text: &str, stopwords: &[String]) -> Vec<Match> {
    VocabularyFilter::new(stopwords, &ReplacementTable::builtin()).scan(text)
}

/// Rewrite `text`, using the built-in table when none is given.
pub fn rewrite(text: &str, stopwords: &[String], table: Option<&ReplacementTable>) -> String {
    match table {
        Some(table) => VocabularyFilter::new(stopwords, table).rewrite(text),
        None => VocabularyFilter::new(stopwords, &ReplacementTable::builtin()).rewrite(text),
    }
}
