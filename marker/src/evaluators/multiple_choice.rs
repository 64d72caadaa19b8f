use std::collections::BTreeSet;

use util::rubric::{ChoiceScoring, Rule, RuleKind};

use super::text::split_choices;
use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Scores a set of selected choices against the set of correct ones.
pub struct MultipleChoiceEvaluator;

fn choice_set<'a>(items: impl IntoIterator<Item = &'a str>, case_sensitive: bool) -> BTreeSet<String> {
    items
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| if case_sensitive { c.to_string() } else { c.to_lowercase() })
        .collect()
}

impl RuleEvaluator for MultipleChoiceEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::MultipleChoice
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::MultipleChoice(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if choice_set(cfg.correct_answers.iter().map(String::as_str), true).is_empty() {
            return Err(MarkerError::invalid_rule(rule.label(), "correct_answers is empty"));
        }
        if let Some(penalty) = cfg.penalty_per_wrong.filter(|p| !p.is_finite() || *p < 0.0) {
            return Err(MarkerError::invalid_rule(
                rule.label(),
                format!("penalty_per_wrong must be non-negative, got {penalty}"),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::MultipleChoice(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let answer = ctx.answer(&cfg.question_id).trim();
        let selected = choice_set(split_choices(answer), cfg.case_sensitive);
        let correct = choice_set(cfg.correct_answers.iter().map(String::as_str), cfg.case_sensitive);

        let matched = selected.intersection(&correct).count();
        let wrong = selected.difference(&correct).count();
        let exact = selected == correct;

        let mut expected: Vec<&str> = cfg.correct_answers.iter().map(String::as_str).collect();
        expected.sort_unstable();
        let expected = expected.join(", ");

        let outcome = ScoreOutcome::for_rule(rule, cfg.max_points)
            .with_student_answer(answer)
            .with_correct_answer(expected.clone());

        if correct.is_empty() {
            return Ok(outcome.with_feedback("No correct choices configured"));
        }

        let share = cfg.max_points / correct.len() as f64;
        let outcome = match cfg.scoring_mode {
            ChoiceScoring::AllOrNothing => {
                if exact {
                    outcome.award(cfg.max_points).with_feedback("All correct")
                } else {
                    outcome.with_feedback(format!("Incorrect. Expected: {expected}"))
                }
            }
            ChoiceScoring::Partial => outcome
                .award(share * matched as f64)
                .correct_if(exact)
                .with_feedback(format!(
                    "Matched {matched}/{} correct choices",
                    correct.len()
                )),
            ChoiceScoring::Negative => {
                let penalty = cfg.penalty_per_wrong.unwrap_or(share);
                outcome
                    .award(share * matched as f64 - penalty * wrong as f64)
                    .correct_if(exact)
                    .with_feedback(format!("Correct: {matched}, Incorrect: {wrong}"))
            }
        };
        Ok(outcome)
    }
}
