use util::rubric::{Rule, RuleKind};

use super::text::normalize;
use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Full points when the normalised answer equals the normalised expected answer.
pub struct ExactMatchEvaluator;

impl RuleEvaluator for ExactMatchEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::ExactMatch
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::ExactMatch(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let raw = ctx.answer(&cfg.question_id);
        let student = normalize(raw, cfg.case_sensitive, cfg.trim_whitespace);
        let expected = normalize(&cfg.correct_answer, cfg.case_sensitive, cfg.trim_whitespace);
        let matched = student == expected;

        let outcome = ScoreOutcome::for_rule(rule, cfg.max_points)
            .with_student_answer(raw)
            .with_correct_answer(cfg.correct_answer.clone());

        Ok(if matched {
            outcome.award(cfg.max_points).with_feedback("Correct")
        } else {
            outcome.with_feedback(format!("Expected: {}", cfg.correct_answer))
        })
    }
}
