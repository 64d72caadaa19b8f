use util::execution_config::ScriptLimits;
use util::rubric::{Rule, RuleKind};
use util::submission::Submission;

use crate::error::MarkerError;
use crate::registry::Registry;
use crate::types::ScoreOutcome;

/// Everything an evaluator may read while grading one submission.
///
/// The context is rebuilt for every submission and only ever borrowed, so
/// nothing one submission does is visible to another.
pub struct EvaluationContext<'a> {
    pub submission: &'a Submission,
    pub registry: &'a Registry,
    pub script_limits: ScriptLimits,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(submission: &'a Submission, registry: &'a Registry, script_limits: ScriptLimits) -> Self {
        Self {
            submission,
            registry,
            script_limits,
        }
    }

    /// The submitted answer for `question_id`, or `""` when missing.
    pub fn answer(&self, question_id: &str) -> &'a str {
        self.submission.answer(question_id)
    }

    /// Grade a nested rule through the registry.
    pub fn evaluate(&self, rule: &Rule) -> Result<ScoreOutcome, MarkerError> {
        self.registry.dispatch(rule, self)
    }
}

/// Strategy trait implemented once per [`RuleKind`].
///
/// `evaluate` only returns `Err` for configuration problems (a rule routed to
/// the wrong evaluator, a nested rule with no evaluator). Anything wrong with
/// the answer itself is reported as a zero-point outcome.
pub trait RuleEvaluator: Send + Sync {
    fn kind(&self) -> RuleKind;

    /// Load-time checks for one rule. Nested rules are visited separately.
    fn validate(&self, _rule: &Rule) -> Result<(), MarkerError> {
        Ok(())
    }

    /// [`validate`](Self::validate) against the limits the rule will be
    /// graded under. Only evaluators that run scripts need to override this.
    fn validate_with_limits(&self, rule: &Rule, _limits: &ScriptLimits) -> Result<(), MarkerError> {
        self.validate(rule)
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError>;
}

/// Error for a rule handed to an evaluator of a different kind.
pub fn kind_mismatch(rule: &Rule, expected: RuleKind) -> MarkerError {
    MarkerError::invalid_rule(
        rule.label(),
        format!("routed to the {expected} evaluator"),
    )
}
