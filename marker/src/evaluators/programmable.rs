//! Adapter between programmable rules and the script sandbox.

use code_runner::{ScriptInputs, ScriptRequest, ScriptState, run_script, validate_script};
use util::execution_config::ScriptLimits;
use util::rubric::{Rule, RuleKind};

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::{FailureKind, ScoreOutcome};

pub struct ProgrammableEvaluator;

impl RuleEvaluator for ProgrammableEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Programmable
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        self.validate_with_limits(rule, &ScriptLimits::default())
    }

    fn validate_with_limits(&self, rule: &Rule, limits: &ScriptLimits) -> Result<(), MarkerError> {
        let Rule::Programmable(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        let limits = limits.with_overrides(cfg.timeout_ms, cfg.memory_kb);
        validate_script(&cfg.script, &limits)
            .map(|_| ())
            .map_err(|e| MarkerError::InvalidScript {
                rule: rule.label(),
                message: e.to_string(),
            })
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Programmable(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let answer = ctx.answer(&cfg.question_id);
        let limits = ctx.script_limits.with_overrides(cfg.timeout_ms, cfg.memory_kb);
        let request = ScriptRequest {
            script: cfg.script.clone(),
            inputs: ScriptInputs {
                answer: answer.to_string(),
                answers: ctx.submission.answers.clone(),
                question_id: cfg.question_id.clone(),
                max_points: cfg.max_points,
            },
        };

        let outcome = match run_script(request, &limits) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(rule = %rule.label(), error = %err, "Sandbox unavailable");
                return Ok(
                    ScoreOutcome::failed(rule, FailureKind::ScriptError, format!("Script error: {err}"))
                        .with_student_answer(answer),
                );
            }
        };

        let graded = match outcome.state {
            ScriptState::Completed => ScoreOutcome::for_rule(rule, cfg.max_points)
                .award(outcome.score)
                .with_feedback(outcome.feedback),
            ScriptState::TimedOut => ScoreOutcome::failed(rule, FailureKind::Timeout, outcome.feedback),
            ScriptState::MemoryExceeded => {
                ScoreOutcome::failed(rule, FailureKind::MemoryExceeded, outcome.feedback)
            }
            _ => ScoreOutcome::failed(rule, FailureKind::ScriptError, outcome.feedback),
        };

        if graded.failure.is_some() {
            tracing::warn!(
                rule = %graded.rule_id,
                student = %ctx.submission.student_id,
                state = %outcome.state,
                "Script did not complete"
            );
        }
        Ok(graded.with_student_answer(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::grade;
    use util::rubric::ProgrammableRule;

    fn rule(script: &str, timeout_ms: Option<u64>) -> Rule {
        Rule::Programmable(ProgrammableRule {
            question_id: "Q1".into(),
            script: script.into(),
            max_points: 10.0,
            timeout_ms,
            memory_kb: None,
            description: None,
        })
    }

    #[test]
    fn script_score_becomes_points() {
        let script = r#"
            if contains(lower(answer), "borrow") { score = max_points; feedback = "ok" }
            else { score = 2 }
        "#;
        let outcome = grade(&rule(script, None), &[("Q1", "The Borrow checker")]);
        assert_eq!(outcome.points_awarded, 10.0);
        assert_eq!(outcome.feedback, "ok");
        assert_eq!(outcome.failure, None);

        assert_eq!(grade(&rule(script, None), &[("Q1", "nope")]).points_awarded, 2.0);
    }

    #[test]
    fn scripts_see_sibling_answers() {
        let script = "score = num(answers['Q2']) * 2";
        assert_eq!(grade(&rule(script, None), &[("Q1", ""), ("Q2", "3")]).points_awarded, 6.0);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(grade(&rule("score = 99", None), &[]).points_awarded, 10.0);
        assert_eq!(grade(&rule("score = -4", None), &[]).points_awarded, 0.0);
    }

    #[test]
    fn runaway_scripts_time_out() {
        let outcome = grade(&rule("while true { }", Some(100)), &[]);
        assert_eq!(outcome.points_awarded, 0.0);
        assert_eq!(outcome.failure, Some(FailureKind::Timeout));
        assert!(outcome.feedback.contains("timed out"));
    }

    #[test]
    fn script_errors_score_zero() {
        let outcome = grade(&rule("score = 1 / 0", None), &[]);
        assert_eq!(outcome.points_awarded, 0.0);
        assert_eq!(outcome.failure, Some(FailureKind::ScriptError));
        assert!(outcome.feedback.starts_with("Script error"));

        let silent = grade(&rule("let x = 1", None), &[]);
        assert_eq!(silent.failure, Some(FailureKind::ScriptError));
    }

    #[test]
    fn unknown_functions_fail_validation() {
        let err = ProgrammableEvaluator
            .validate(&rule("score = open('/etc/passwd')", None))
            .unwrap_err();
        assert!(matches!(err, MarkerError::InvalidScript { .. }));
    }

    #[test]
    fn validation_uses_the_configured_limits() {
        let script = "let a = 1\nlet b = 2\nscore = a + b";
        let tight = ScriptLimits {
            max_script_lines: 2,
            ..ScriptLimits::default()
        };
        assert!(ProgrammableEvaluator.validate(&rule(script, None)).is_ok());
        let err = ProgrammableEvaluator
            .validate_with_limits(&rule(script, None), &tight)
            .unwrap_err();
        assert!(matches!(err, MarkerError::InvalidScript { .. }));
    }
}
