//! Folding reviewed questions back into a task.

use crate::question::{Question, ValidationKind};
use crate::task::Stage;

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub replaced: usize,
    pub dropped: usize,
}

/// The validation slot a stage fills, if it is a reviewing stage.
pub fn validation_kind(stage: Stage) -> Option<ValidationKind> {
    match stage {
        Stage::Content => None,
        Stage::Rt => Some(ValidationKind::Rt),
        Stage::De => Some(ValidationKind::De),
        Stage::Validator => Some(ValidationKind::Final),
    }
}

/// Replace, for each incoming question, the first existing question with the
/// same `objective_id`. Incoming questions without a match are dropped.
///
/// Length and order of `existing` never change.
pub fn replace_by_objective(
    existing: &mut [Question],
    incoming: Vec<Question>,
    stage: Stage,
) -> MergeStats {
    let mut stats = MergeStats::default();

    for mut question in incoming {
        let Some(slot) = existing
            .iter_mut()
            .find(|q| q.objective_id == question.objective_id)
        else {
            tracing::debug!(
                %stage,
                objective_id = %question.objective_id,
                "Dropping reviewed question with no matching objective"
            );
            stats.dropped += 1;
            continue;
        };

        stamp(&mut question, stage);
        *slot = question;
        stats.replaced += 1;
    }

    stats
}

/// Mark `question` as last modified by `stage`, timestamping the stage's
/// verdict when the reviewer left it unstamped.
pub fn stamp(question: &mut Question, stage: Stage) {
    let pending = validation_kind(stage).and_then(|kind| {
        question
            .validation
            .get(kind)
            .filter(|outcome| outcome.timestamp.is_none())
            .cloned()
            .map(|outcome| (kind, outcome))
    });

    match pending {
        Some((kind, outcome)) => question.add_validation(kind, outcome, stage),
        None => question.touch(stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::tests::sample_question;
    use crate::question::{ValidationOutcome, ValidationStatus};
    use proptest::prelude::*;

    fn reviewed(objective_id: &str, statement: &str) -> Question {
        let mut q = sample_question(objective_id);
        q.statement = statement.to_string();
        q
    }

    #[test]
    fn test_single_match_replaces_in_place() {
        let mut existing = vec![
            sample_question("Obj.1"),
            sample_question("Obj.2"),
            sample_question("Obj.3"),
        ];
        let ids: Vec<String> = existing.iter().map(|q| q.objective_id.clone()).collect();

        let stats = replace_by_objective(&mut existing, vec![reviewed("Obj.2", "Revisado?")], Stage::Rt);

        assert_eq!(stats, MergeStats { replaced: 1, dropped: 0 });
        assert_eq!(existing.len(), 3);
        let after: Vec<String> = existing.iter().map(|q| q.objective_id.clone()).collect();
        assert_eq!(after, ids);
        assert_eq!(existing[1].statement, "Revisado?");
        assert_eq!(existing[1].metadata.last_modified_by, "rt");
        assert_ne!(existing[0].statement, "Revisado?");
    }

    #[test]
    fn test_unmatched_records_are_dropped() {
        let mut existing = vec![sample_question("Obj.1")];
        let stats = replace_by_objective(&mut existing, vec![reviewed("Obj.9", "?")], Stage::De);
        assert_eq!(stats, MergeStats { replaced: 0, dropped: 1 });
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn test_first_match_wins_for_duplicate_objectives() {
        let mut existing = vec![sample_question("Obj.1"), sample_question("Obj.1")];
        let original_second = existing[1].id.clone();
        replace_by_objective(&mut existing, vec![reviewed("Obj.1", "Novo?")], Stage::Rt);
        assert_eq!(existing[0].statement, "Novo?");
        assert_eq!(existing[1].id, original_second);
    }

    #[test]
    fn test_unstamped_verdict_gets_a_timestamp() {
        let mut q = sample_question("Obj.1");
        q.validation.de = Some(ValidationOutcome {
            status: ValidationStatus::Approved,
            comments: String::new(),
            checklist: Default::default(),
            timestamp: None,
        });
        stamp(&mut q, Stage::De);
        assert!(q.validation.de.as_ref().unwrap().timestamp.is_some());
        assert_eq!(q.metadata.last_modified_by, "de");
    }

    fn objective() -> impl Strategy<Value = String> {
        (1u8..=6).prop_map(|n| format!("Obj.{n}"))
    }

    proptest! {
        #[test]
        fn prop_merge_keeps_length_and_order(
            existing_ids in proptest::collection::vec(objective(), 0..8),
            incoming_ids in proptest::collection::vec(objective(), 0..8),
        ) {
            let mut existing: Vec<Question> = existing_ids.iter().map(|id| sample_question(id)).collect();
            let incoming: Vec<Question> = incoming_ids.iter().map(|id| reviewed(id, "Revisado?")).collect();

            let stats = replace_by_objective(&mut existing, incoming, Stage::De);

            let after: Vec<String> = existing.iter().map(|q| q.objective_id.clone()).collect();
            prop_assert_eq!(after, existing_ids.clone());
            prop_assert_eq!(stats.replaced + stats.dropped, incoming_ids.len());
            let expected_dropped = incoming_ids.iter().filter(|id| !existing_ids.contains(*id)).count();
            prop_assert_eq!(stats.dropped, expected_dropped);
        }
    }
}
