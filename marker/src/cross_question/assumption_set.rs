use util::rubric::{AnswerSet, AssumptionMode, AssumptionSetRule, Rule, RuleKind};
use util::submission::Submission;

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Grades a group of questions against several alternative answer keys.
///
/// - `favor_best`: each set is scored by the weighted count of questions it
///   agrees on, and the highest-scoring set wins. Ties keep the set declared
///   first.
/// - `first_match`: the first set that agrees on every question awards full
///   points; otherwise nothing.
pub struct AssumptionSetEvaluator;

fn agrees(set: &AnswerSet, submission: &Submission, question_id: &str) -> bool {
    set.answers
        .get(question_id)
        .is_some_and(|expected| submission.answer(question_id) == expected)
}

fn set_score(cfg: &AssumptionSetRule, set: &AnswerSet, submission: &Submission) -> f64 {
    cfg.question_ids
        .iter()
        .filter(|q| agrees(set, submission, q))
        .map(|q| cfg.points_for(q))
        .sum()
}

/// Best set and its score under `favor_best`.
pub fn favor_best<'r>(cfg: &'r AssumptionSetRule, submission: &Submission) -> Option<(&'r AnswerSet, f64)> {
    let mut best: Option<(&AnswerSet, f64)> = None;
    for set in &cfg.answer_sets {
        let score = set_score(cfg, set, submission);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((set, score));
        }
    }
    best
}

/// First set matching every question, under `first_match`.
pub fn first_match<'r>(cfg: &'r AssumptionSetRule, submission: &Submission) -> Option<&'r AnswerSet> {
    cfg.answer_sets
        .iter()
        .find(|set| cfg.question_ids.iter().all(|q| agrees(set, submission, q)))
}

impl RuleEvaluator for AssumptionSetEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::AssumptionSet
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::AssumptionSet(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        let invalid = |message: String| Err(MarkerError::invalid_rule(rule.label(), message));

        if cfg.question_ids.is_empty() {
            return invalid("question_ids is empty".into());
        }
        if cfg.answer_sets.is_empty() {
            return invalid("answer_sets is empty".into());
        }
        for set in &cfg.answer_sets {
            if let Some(q) = cfg.question_ids.iter().find(|q| !set.answers.contains_key(*q)) {
                return invalid(format!("answer set '{}' has no answer for {q}", set.name));
            }
        }
        if let Some((q, p)) = cfg
            .points_per_question
            .iter()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return invalid(format!("points for {q} must be non-negative, got {p}"));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::AssumptionSet(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let total = cfg.total_points();
        let submitted: Vec<String> = cfg
            .question_ids
            .iter()
            .map(|q| format!("{q}={}", ctx.answer(q)))
            .collect();
        let outcome = ScoreOutcome::for_rule(rule, total).with_student_answer(submitted.join(", "));

        let (chosen, points) = match cfg.mode {
            AssumptionMode::FavorBest => match favor_best(cfg, ctx.submission) {
                Some((set, score)) => (Some(set), score),
                None => (None, 0.0),
            },
            AssumptionMode::FirstMatch => match first_match(cfg, ctx.submission) {
                Some(set) => (Some(set), total),
                None => (None, 0.0),
            },
        };

        let feedback = match chosen {
            Some(set) if points > 0.0 => format!(
                "Best matching answer set: {} ({}/{} points)",
                set.name,
                crate::evaluators::text::format_points(points),
                crate::evaluators::text::format_points(total)
            ),
            _ => "No answer set matched".to_string(),
        };

        let mut outcome = outcome.award(points).with_feedback(feedback);
        if let Some(set) = chosen {
            let expected: Vec<String> = cfg
                .question_ids
                .iter()
                .filter_map(|q| set.answers.get(q).map(|a| format!("{q}={a}")))
                .collect();
            outcome = outcome.with_correct_answer(expected.join(", "));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::grade;
    use std::collections::BTreeMap;

    fn set(name: &str, answers: &[(&str, &str)]) -> AnswerSet {
        AnswerSet {
            name: name.into(),
            answers: answers.iter().map(|(q, a)| (q.to_string(), a.to_string())).collect(),
        }
    }

    fn rule(mode: AssumptionMode) -> Rule {
        Rule::AssumptionSet(AssumptionSetRule {
            question_ids: vec!["q1".into(), "q2".into()],
            answer_sets: vec![
                set("celsius", &[("q1", "100"), ("q2", "0")]),
                set("fahrenheit", &[("q1", "212"), ("q2", "32")]),
            ],
            mode,
            points_per_question: BTreeMap::from([("q1".to_string(), 3.0)]),
            description: None,
        })
    }

    #[test]
    fn favor_best_picks_the_highest_scoring_set() {
        let outcome = grade(&rule(AssumptionMode::FavorBest), &[("q1", "212"), ("q2", "0")]);
        // fahrenheit agrees on q1 (3 points), celsius on q2 (1 point); credit
        // from different sets is never pooled
        assert_eq!(outcome.points_awarded, 3.0);
        assert_eq!(outcome.max_points, 4.0);
        assert_eq!(outcome.is_correct, Some(false));
        assert_eq!(outcome.feedback, "Best matching answer set: fahrenheit (3/4 points)");
    }

    #[test]
    fn first_match_is_all_or_nothing() {
        let r = rule(AssumptionMode::FirstMatch);
        assert_eq!(grade(&r, &[("q1", "212"), ("q2", "0")]).points_awarded, 0.0);
        let full = grade(&r, &[("q1", "212"), ("q2", "32")]);
        assert_eq!(full.points_awarded, 4.0);
        assert_eq!(full.correct_answer.as_deref(), Some("q1=212, q2=32"));
    }

    #[test]
    fn ties_keep_the_first_declared_set() {
        let outcome = grade(&rule(AssumptionMode::FavorBest), &[("q1", "x"), ("q2", "y")]);
        assert_eq!(outcome.points_awarded, 0.0);
        assert_eq!(outcome.feedback, "No answer set matched");
        assert_eq!(outcome.correct_answer.as_deref(), Some("q1=100, q2=0"));
    }

    #[test]
    fn incomplete_sets_fail_validation() {
        let bad = Rule::AssumptionSet(AssumptionSetRule {
            question_ids: vec!["q1".into(), "q2".into()],
            answer_sets: vec![set("partial", &[("q1", "1")])],
            mode: AssumptionMode::FavorBest,
            points_per_question: BTreeMap::new(),
            description: None,
        });
        assert!(AssumptionSetEvaluator.validate(&bad).is_err());
    }
}
