use util::rubric::{NumericRangeRule, Rule, RuleKind};

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::{FailureKind, ScoreOutcome};

/// Full points when the answer parses to a number inside `[min_value, max_value]`.
pub struct NumericRangeEvaluator;

fn format_range(cfg: &NumericRangeRule) -> String {
    format!("[{}, {}]", cfg.min_value, cfg.max_value)
}

/// Parses a numeric answer, ignoring thousands separators.
fn parse_number(answer: &str) -> Option<f64> {
    let cleaned: String = answer.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

impl RuleEvaluator for NumericRangeEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::NumericRange
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::NumericRange(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if cfg.min_value.is_nan() || cfg.max_value.is_nan() || cfg.min_value > cfg.max_value {
            return Err(MarkerError::invalid_rule(
                rule.label(),
                format!("min_value {} exceeds max_value {}", cfg.min_value, cfg.max_value),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::NumericRange(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let answer = ctx.answer(&cfg.question_id).trim();
        let range = format_range(cfg);

        if answer.is_empty() {
            return Ok(ScoreOutcome::failed(rule, FailureKind::EvaluationError, "No answer provided")
                .with_student_answer(answer)
                .with_correct_answer(range));
        }

        let Some(value) = parse_number(answer) else {
            return Ok(
                ScoreOutcome::failed(rule, FailureKind::EvaluationError, "Invalid numeric value")
                    .with_student_answer(answer)
                    .with_correct_answer(range),
            );
        };

        let outcome = ScoreOutcome::for_rule(rule, cfg.max_points)
            .with_student_answer(answer)
            .with_correct_answer(range.clone());

        Ok(if value < cfg.min_value {
            outcome.with_feedback(format!(
                "Below minimum (difference: {:.2})",
                cfg.min_value - value
            ))
        } else if value > cfg.max_value {
            outcome.with_feedback(format!(
                "Above maximum (difference: {:.2})",
                value - cfg.max_value
            ))
        } else {
            outcome
                .award(cfg.max_points)
                .with_feedback(format!("Within acceptable range {range}"))
        })
    }
}
