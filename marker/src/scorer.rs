//! # Scorer Module
//!
//! Grades one submission against every top-level rule of a rubric.
//!
//! Grading a submission reads only the rubric and that submission, so any
//! number of submissions can be scored concurrently against the same rubric.

use util::execution_config::ScriptLimits;
use util::rubric::Rubric;
use util::submission::Submission;

use crate::error::MarkerError;
use crate::registry::Registry;
use crate::report::StudentResult;
use crate::traits::evaluator::EvaluationContext;

/// Evaluate each top-level rule in rubric order and total the outcomes.
///
/// # Errors
///
/// Only configuration problems the rubric should already have been validated
/// against (e.g. a rule type with no registered evaluator). Bad answers and
/// failing scripts produce zero-point outcomes instead.
pub fn grade_submission(
    rubric: &Rubric,
    submission: &Submission,
    registry: &Registry,
    script_limits: ScriptLimits,
) -> Result<StudentResult, MarkerError> {
    let ctx = EvaluationContext::new(submission, registry, script_limits);
    let details = rubric
        .rules
        .iter()
        .map(|rule| registry.dispatch(rule, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let result = StudentResult::from_outcomes(&submission.student_id, details);
    tracing::debug!(
        student = %result.student_id,
        total = result.total_points,
        max = result.max_points,
        "Graded submission"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::rubric::{ConditionalRule, ExactMatchRule, Rule};

    fn rubric() -> Rubric {
        Rubric::new(
            "quiz",
            vec![
                Rule::ExactMatch(ExactMatchRule {
                    question_id: "Q1".into(),
                    correct_answer: "Paris".into(),
                    max_points: 10.0,
                    case_sensitive: false,
                    trim_whitespace: true,
                    description: None,
                }),
                Rule::Conditional(ConditionalRule {
                    if_question: "Q2".into(),
                    if_answer: "yes".into(),
                    then_question: "Q3".into(),
                    then_correct_answer: "42".into(),
                    max_points: 5.0,
                    description: None,
                }),
            ],
        )
    }

    #[test]
    fn totals_follow_rubric_order() {
        let submission = Submission::new("s1", [("Q1", "paris"), ("Q2", "yes"), ("Q3", "41")]);
        let result =
            grade_submission(&rubric(), &submission, &Registry::with_defaults(), ScriptLimits::default())
                .unwrap();
        assert_eq!(result.details[0].rule_id, "EXACT_MATCH:Q1");
        assert_eq!(result.details[1].rule_id, "CONDITIONAL:Q3");
        assert_eq!(result.total_points, 10.0);
        assert_eq!(result.max_points, 15.0);
    }

    #[test]
    fn unmet_conditions_leave_the_denominator_alone() {
        let submission = Submission::new("s1", [("Q1", "paris"), ("Q2", "no")]);
        let result =
            grade_submission(&rubric(), &submission, &Registry::with_defaults(), ScriptLimits::default())
                .unwrap();
        assert_eq!(result.total_points, 10.0);
        assert_eq!(result.max_points, 10.0);
        assert_eq!(result.percentage, 100.0);
    }

    #[test]
    fn unregistered_rule_types_are_errors() {
        let mut registry = Registry::with_defaults();
        registry.unregister(util::rubric::RuleKind::Conditional);
        let submission = Submission::new("s1", [("Q1", "paris")]);
        let err = grade_submission(&rubric(), &submission, &registry, ScriptLimits::default()).unwrap_err();
        assert!(matches!(err, MarkerError::UnknownRuleType(_)));
    }
}
