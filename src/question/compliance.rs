//! Structural checks on a built question.

use std::collections::HashSet;

use serde::Serialize;

use super::{Question, QuestionType};

const ALTERNATIVE_IDS: [&str; 5] = ["a", "b", "c", "d", "e"];
const EXPECTED_ALTERNATIVES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub issues: Vec<String>,
}

/// Check a question against the format rules. Never fails; problems are
/// collected into `issues`.
pub fn check_compliance(question: &Question) -> ComplianceReport {
    let mut issues = Vec::new();

    if question.context.trim().is_empty() {
        issues.push("context is empty".to_string());
    }
    if question.statement.trim().is_empty() {
        issues.push("statement is empty".to_string());
    }

    if question.alternatives.len() != EXPECTED_ALTERNATIVES {
        issues.push(format!(
            "expected {} alternatives, found {}",
            EXPECTED_ALTERNATIVES,
            question.alternatives.len()
        ));
    }

    let mut seen = HashSet::new();
    for alternative in &question.alternatives {
        let id = alternative.id.as_str();
        if !ALTERNATIVE_IDS.contains(&id) {
            issues.push(format!("alternative id '{}' is outside a-e", alternative.id));
        }
        if !seen.insert(id) {
            issues.push(format!("alternative id '{}' is repeated", alternative.id));
        }
        if !question.feedback.contains_key(&alternative.id) {
            issues.push(format!("no feedback for alternative '{}'", alternative.id));
        }
    }

    if matches!(
        question.kind,
        QuestionType::SingleAnswer | QuestionType::AssertionReason
    ) {
        let correct = question.correct_alternatives().count();
        if correct != 1 {
            issues.push(format!("expected exactly one correct alternative, found {}", correct));
        }
    }

    let expected = question.kind.expected_assertions();
    if question.assertions.len() != expected {
        issues.push(format!(
            "{} expects {} assertions, found {}",
            question.kind,
            expected,
            question.assertions.len()
        ));
    }

    let mut seen = HashSet::new();
    for assertion in &question.assertions {
        if !seen.insert(assertion.id.trim()) {
            issues.push(format!("assertion id '{}' is repeated", assertion.id));
        }
    }

    ComplianceReport {
        compliant: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::tests::sample_question;
    use crate::question::Assertion;

    #[test]
    fn test_sample_is_compliant() {
        let report = check_compliance(&sample_question("Obj.1"));
        assert!(report.compliant, "{:?}", report.issues);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_collects_every_problem() {
        let mut q = sample_question("Obj.1");
        q.context = "  ".into();
        q.alternatives.pop();
        q.alternatives[1].id = "a".into();
        q.alternatives[2].correct = true;

        let report = check_compliance(&q);
        assert!(!report.compliant);
        assert!(report.issues.iter().any(|i| i.contains("context")));
        assert!(report.issues.iter().any(|i| i.contains("expected 5 alternatives")));
        assert!(report.issues.iter().any(|i| i.contains("repeated")));
        assert!(report.issues.iter().any(|i| i.contains("exactly one correct")));
    }

    #[test]
    fn test_alternative_ids_are_lowercase_letters() {
        let mut q = sample_question("Obj.1");
        q.alternatives[0].id = "A".into();
        let feedback = q.feedback.remove("a").unwrap();
        q.feedback.insert("A".into(), feedback);

        let report = check_compliance(&q);
        assert_eq!(report.issues, vec!["alternative id 'A' is outside a-e".to_string()]);
    }

    #[test]
    fn test_missing_feedback_key() {
        let mut q = sample_question("Obj.1");
        q.feedback.remove("c");
        let report = check_compliance(&q);
        assert_eq!(report.issues, vec!["no feedback for alternative 'c'".to_string()]);
    }

    #[test]
    fn test_assertion_counts_per_type() {
        let mut q = sample_question("Obj.1");
        q.kind = QuestionType::MultipleAnswer;
        assert!(!check_compliance(&q).compliant);

        q.assertions = ["I", "II", "III", "IV"]
            .iter()
            .map(|id| Assertion {
                id: id.to_string(),
                text: format!("Afirmativa {}", id),
                correct: *id != "II",
            })
            .collect();
        assert!(check_compliance(&q).compliant);

        q.kind = QuestionType::SingleAnswer;
        assert!(check_compliance(&q)
            .issues
            .iter()
            .any(|i| i.contains("expects 0 assertions")));
    }
}
