use util::rubric::{Rule, RuleKind};

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// If `if_question` was answered `if_answer`, grade `then_question`;
/// otherwise the rule does not apply and counts for nothing either way.
pub struct ConditionalEvaluator;

impl RuleEvaluator for ConditionalEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Conditional
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Conditional(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if cfg.if_question == cfg.then_question {
            return Err(MarkerError::invalid_rule(
                rule.label(),
                "if_question and then_question must differ",
            ));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Conditional(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let trigger = ctx.answer(&cfg.if_question);
        if trigger != cfg.if_answer {
            return Ok(ScoreOutcome::not_applicable(
                rule,
                format!(
                    "Not applicable: {} was not answered '{}'",
                    cfg.if_question, cfg.if_answer
                ),
            ));
        }

        let answer = ctx.answer(&cfg.then_question);
        let outcome = ScoreOutcome::for_rule(rule, cfg.max_points)
            .with_question(cfg.then_question.clone())
            .with_student_answer(answer)
            .with_correct_answer(cfg.then_correct_answer.clone());

        Ok(if answer == cfg.then_correct_answer {
            outcome.award(cfg.max_points).with_feedback("Correct")
        } else {
            outcome.with_feedback(format!("Expected: {}", cfg.then_correct_answer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::grade;
    use util::rubric::ConditionalRule;

    fn rule() -> Rule {
        Rule::Conditional(ConditionalRule {
            if_question: "Q1".into(),
            if_answer: "metric".into(),
            then_question: "Q2".into(),
            then_correct_answer: "100".into(),
            max_points: 3.0,
            description: None,
        })
    }

    #[test]
    fn grades_the_dependent_question_when_triggered() {
        let hit = grade(&rule(), &[("Q1", "metric"), ("Q2", "100")]);
        assert_eq!(hit.points_awarded, 3.0);
        assert_eq!(hit.is_correct, Some(true));
        assert_eq!(hit.question_id, "Q2");

        let miss = grade(&rule(), &[("Q1", "metric"), ("Q2", "212")]);
        assert_eq!(miss.points_awarded, 0.0);
        assert_eq!(miss.is_correct, Some(false));
    }

    #[test]
    fn unmet_condition_is_not_applicable() {
        let outcome = grade(&rule(), &[("Q1", "imperial"), ("Q2", "100")]);
        assert_eq!(outcome.is_correct, None);
        assert_eq!(outcome.points_awarded, 0.0);
    }

    #[test]
    fn trigger_comparison_is_exact() {
        assert_eq!(grade(&rule(), &[("Q1", "Metric"), ("Q2", "100")]).is_correct, None);
    }

    #[test]
    fn self_reference_fails_validation() {
        let bad = Rule::Conditional(ConditionalRule {
            if_question: "Q1".into(),
            if_answer: "a".into(),
            then_question: "Q1".into(),
            then_correct_answer: "a".into(),
            max_points: 1.0,
            description: None,
        });
        assert!(ConditionalEvaluator.validate(&bad).is_err());
    }
}
