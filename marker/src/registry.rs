//! # Rule Registry
//!
//! Maps each [`RuleKind`] to the [`RuleEvaluator`] that grades it. A registry
//! is filled once (normally through [`Registry::with_defaults`]) and then only
//! read, so one instance can be shared by every grading thread.
//!
//! [`Registry::validate_rubric`] walks the whole rule tree before grading
//! starts, so an unknown rule type or a malformed rule stops the run before a
//! single score is produced.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use util::execution_config::ScriptLimits;
use util::rubric::{Rubric, Rule, RuleKind};

use crate::composite::CompositeEvaluator;
use crate::cross_question::{AssumptionSetEvaluator, ConditionalEvaluator};
use crate::error::MarkerError;
use crate::evaluators::{
    ExactMatchEvaluator, KeywordEvaluator, LengthEvaluator, MultipleChoiceEvaluator,
    NumericRangeEvaluator, ProgrammableEvaluator, RegexEvaluator, SimilarityEvaluator,
};
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator};
use crate::types::ScoreOutcome;

/// Deepest composite nesting accepted at validation time.
pub const MAX_RULE_DEPTH: usize = 64;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Process-wide registry with every built-in evaluator.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::with_defaults)
}

#[derive(Default, Clone)]
pub struct Registry {
    evaluators: HashMap<RuleKind, Arc<dyn RuleEvaluator>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.evaluators.keys().copied().collect();
        kinds.sort();
        f.debug_struct("Registry").field("kinds", &kinds).finish()
    }
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ExactMatchEvaluator);
        registry.register(NumericRangeEvaluator);
        registry.register(MultipleChoiceEvaluator);
        registry.register(LengthEvaluator);
        registry.register(KeywordEvaluator);
        registry.register(RegexEvaluator::default());
        registry.register(SimilarityEvaluator);
        registry.register(ProgrammableEvaluator);
        registry.register(CompositeEvaluator);
        registry.register(ConditionalEvaluator);
        registry.register(AssumptionSetEvaluator);
        registry
    }

    /// Bind `evaluator` to its kind, returning whatever it replaced.
    pub fn register<E: RuleEvaluator + 'static>(&mut self, evaluator: E) -> Option<Arc<dyn RuleEvaluator>> {
        self.evaluators.insert(evaluator.kind(), Arc::new(evaluator))
    }

    pub fn unregister(&mut self, kind: RuleKind) -> Option<Arc<dyn RuleEvaluator>> {
        self.evaluators.remove(&kind)
    }

    pub fn contains(&self, kind: RuleKind) -> bool {
        self.evaluators.contains_key(&kind)
    }

    pub fn evaluator(&self, kind: RuleKind) -> Result<&dyn RuleEvaluator, MarkerError> {
        self.evaluators
            .get(&kind)
            .map(|e| e.as_ref())
            .ok_or(MarkerError::UnknownRuleType(kind))
    }

    /// Grade `rule` with the evaluator registered for its kind.
    pub fn dispatch(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let outcome = self.evaluator(rule.kind())?.evaluate(rule, ctx)?;
        tracing::debug!(
            rule = %outcome.rule_id,
            student = %ctx.submission.student_id,
            points = outcome.points_awarded,
            max = outcome.max_points,
            "Evaluated rule"
        );
        Ok(outcome)
    }

    /// Validate one rule and everything nested in it, collecting every problem.
    pub fn validate_rule(&self, rule: &Rule) -> Vec<MarkerError> {
        self.validate_rule_with(rule, &ScriptLimits::default())
    }

    /// [`validate_rule`](Self::validate_rule) against the limits scripts
    /// will actually run under.
    pub fn validate_rule_with(&self, rule: &Rule, limits: &ScriptLimits) -> Vec<MarkerError> {
        let mut problems = Vec::new();
        self.walk(rule, limits, 1, &mut problems);
        problems
    }

    fn walk(&self, rule: &Rule, limits: &ScriptLimits, depth: usize, problems: &mut Vec<MarkerError>) {
        if depth > MAX_RULE_DEPTH {
            problems.push(MarkerError::RuleTooDeep {
                rule: rule.label(),
                limit: MAX_RULE_DEPTH,
            });
            return;
        }

        let max = rule.declared_max_points();
        if !max.is_finite() || max < 0.0 {
            problems.push(MarkerError::invalid_rule(
                rule.label(),
                format!("max points must be a non-negative number, got {max}"),
            ));
        }

        match self.evaluator(rule.kind()) {
            Ok(evaluator) => {
                if let Err(err) = evaluator.validate_with_limits(rule, limits) {
                    problems.push(err);
                }
            }
            Err(err) => problems.push(err),
        }

        for child in rule.children() {
            self.walk(child, limits, depth + 1, problems);
        }
    }

    /// Validate a whole rubric. Every problem is reported, not only the first.
    pub fn validate_rubric(&self, rubric: &Rubric) -> Result<(), MarkerError> {
        self.validate_rubric_with(rubric, &ScriptLimits::default())
    }

    pub fn validate_rubric_with(&self, rubric: &Rubric, limits: &ScriptLimits) -> Result<(), MarkerError> {
        let problems: Vec<String> = rubric
            .rules
            .iter()
            .enumerate()
            .flat_map(|(index, rule)| {
                self.validate_rule_with(rule, limits)
                    .into_iter()
                    .map(move |err| format!("rule #{}: {err}", index + 1))
            })
            .collect();

        if problems.is_empty() {
            tracing::debug!(rubric = %rubric.name, rules = rubric.rules.len(), "Rubric validated");
            Ok(())
        } else {
            tracing::warn!(rubric = %rubric.name, problems = problems.len(), "Rubric failed validation");
            Err(MarkerError::Validation(problems))
        }
    }
}
