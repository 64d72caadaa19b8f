use util::rubric::{LengthUnit, Rule, RuleKind};

use super::text::{char_count, word_count};
use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Full points when the answer's length falls within the configured bounds.
pub struct LengthEvaluator;

fn unit_name(unit: LengthUnit) -> &'static str {
    match unit {
        LengthUnit::Characters => "characters",
        LengthUnit::Words => "words",
    }
}

fn bound(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl RuleEvaluator for LengthEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Length
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Length(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        match (cfg.min_length, cfg.max_length) {
            (None, None) => Err(MarkerError::invalid_rule(
                rule.label(),
                "at least one of min_length or max_length is required",
            )),
            (Some(min), Some(max)) if min > max => Err(MarkerError::invalid_rule(
                rule.label(),
                format!("min_length {min} exceeds max_length {max}"),
            )),
            _ => Ok(()),
        }
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Length(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let answer = ctx.answer(&cfg.question_id);
        let count = match cfg.mode {
            LengthUnit::Characters => char_count(answer),
            LengthUnit::Words => word_count(answer),
        };
        let unit = unit_name(cfg.mode);
        let expected = format!("{}..{} {unit}", bound(cfg.min_length), bound(cfg.max_length));

        let mut violations = Vec::new();
        if let Some(min) = cfg.min_length.filter(|min| count < *min) {
            violations.push(format!("fewer than {min} {unit}"));
        }
        if let Some(max) = cfg.max_length.filter(|max| count > *max) {
            violations.push(format!("more than {max} {unit}"));
        }

        let outcome = ScoreOutcome::for_rule(rule, cfg.max_points)
            .with_student_answer(answer)
            .with_correct_answer(format!("Length within {expected}"));

        Ok(if violations.is_empty() {
            outcome
                .award(cfg.max_points)
                .with_feedback(format!("Length constraints met (actual: {count}, expected: {expected})"))
        } else {
            outcome.with_feedback(format!(
                "Length constraints violated: {} (actual: {count})",
                violations.join("; ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::grade;
    use util::rubric::LengthRule;

    fn rule(min: Option<usize>, max: Option<usize>, mode: LengthUnit) -> Rule {
        Rule::Length(LengthRule {
            question_id: "Q1".into(),
            max_points: 2.0,
            min_length: min,
            max_length: max,
            mode,
            description: None,
        })
    }

    #[test]
    fn counts_words() {
        let r = rule(Some(3), Some(5), LengthUnit::Words);
        assert_eq!(grade(&r, &[("Q1", "one two three")]).points_awarded, 2.0);
        let short = grade(&r, &[("Q1", "one two")]);
        assert_eq!(short.points_awarded, 0.0);
        assert_eq!(
            short.feedback,
            "Length constraints violated: fewer than 3 words (actual: 2)"
        );
    }

    #[test]
    fn counts_characters() {
        let r = rule(None, Some(5), LengthUnit::Characters);
        assert_eq!(grade(&r, &[("Q1", "héllo")]).points_awarded, 2.0);
        assert_eq!(grade(&r, &[("Q1", "hello!")]).points_awarded, 0.0);
    }

    #[test]
    fn bounds_are_validated() {
        assert!(LengthEvaluator.validate(&rule(None, None, LengthUnit::Words)).is_err());
        assert!(LengthEvaluator.validate(&rule(Some(4), Some(2), LengthUnit::Words)).is_err());
        assert!(LengthEvaluator.validate(&rule(Some(2), None, LengthUnit::Words)).is_ok());
    }
}
