//! # Composite Evaluator
//!
//! Grades a group of rules and combines the children's outcomes into one.
//!
//! | Mode       | Points                                        | Max                   |
//! |------------|-----------------------------------------------|-----------------------|
//! | `AND`      | Σ child max if every child fully passes, else 0 | Σ child max         |
//! | `OR`/`MAX` | best child's points                           | best child's max      |
//! | `WEIGHTED` | Σ wᵢ · (pointsᵢ / maxᵢ) × Σ child max         | Σ child max           |
//! | `SUM`      | Σ child points                                | Σ child max           |
//! | `MIN`      | weakest child's points                        | weakest child's max   |
//! | `AVERAGE`  | mean child points                             | mean child max        |
//! | `MULTIPLY` | Π child points                                | Π child max           |
//!
//! `OR` with `min_passing = k` only awards the best child's points when at
//! least `k` children fully pass. `MULTIPLY` is correct only when every
//! child is. Children that do not apply to the
//! submission are left out before combining.

use util::rubric::{CompositeMode, CompositeRule, Rule, RuleKind};

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

pub struct CompositeEvaluator;

fn mode_name(mode: CompositeMode) -> &'static str {
    match mode {
        CompositeMode::And => "AND",
        CompositeMode::Or => "OR",
        CompositeMode::Weighted => "WEIGHTED",
        CompositeMode::Sum => "SUM",
        CompositeMode::Max => "MAX",
        CompositeMode::Min => "MIN",
        CompositeMode::Average => "AVERAGE",
        CompositeMode::Multiply => "MULTIPLY",
    }
}

/// First child with the highest points.
fn best(children: &[(f64, ScoreOutcome)]) -> &ScoreOutcome {
    let mut top = &children[0].1;
    for (_, child) in &children[1..] {
        if child.points_awarded > top.points_awarded {
            top = child;
        }
    }
    top
}

/// First child with the lowest points.
fn worst(children: &[(f64, ScoreOutcome)]) -> &ScoreOutcome {
    let mut low = &children[0].1;
    for (_, child) in &children[1..] {
        if child.points_awarded < low.points_awarded {
            low = child;
        }
    }
    low
}

/// Combined `(points, max, is_correct)` for non-empty `children`, each paired
/// with its weight.
fn combine(cfg: &CompositeRule, children: &[(f64, ScoreOutcome)]) -> (f64, f64, bool) {
    let total_max: f64 = children.iter().map(|(_, c)| c.max_points).sum();
    let total_points: f64 = children.iter().map(|(_, c)| c.points_awarded).sum();
    let passed = children.iter().filter(|(_, c)| c.fully_passed()).count();
    let all_passed = passed == children.len();

    match cfg.mode {
        CompositeMode::And => {
            if all_passed {
                (total_max, total_max, true)
            } else {
                (0.0, total_max, false)
            }
        }
        CompositeMode::Or | CompositeMode::Max => {
            let top = best(children);
            match cfg.min_passing.filter(|_| cfg.mode == CompositeMode::Or) {
                Some(k) if passed < k => (0.0, top.max_points, false),
                Some(_) => (top.points_awarded, top.max_points, true),
                None => (top.points_awarded, top.max_points, top.fully_passed()),
            }
        }
        CompositeMode::Weighted => {
            let score: f64 = children.iter().map(|(w, c)| w * c.normalized()).sum();
            (score * total_max, total_max, score >= cfg.correctness_threshold)
        }
        CompositeMode::Sum => (total_points, total_max, all_passed),
        CompositeMode::Min => {
            let low = worst(children);
            (low.points_awarded, low.max_points, low.fully_passed())
        }
        CompositeMode::Average => {
            let n = children.len() as f64;
            (total_points / n, total_max / n, all_passed)
        }
        CompositeMode::Multiply => {
            let points = children.iter().map(|(_, c)| c.points_awarded).product();
            let max = children.iter().map(|(_, c)| c.max_points).product();
            let correct = children.iter().all(|(_, c)| c.is_correct == Some(true));
            (points, max, correct)
        }
    }
}

impl RuleEvaluator for CompositeEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Composite
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Composite(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        let invalid = |message: String| Err(MarkerError::invalid_rule(rule.label(), message));

        if cfg.rules.is_empty() {
            return invalid("needs at least one sub-rule".into());
        }
        if !(0.0..=1.0).contains(&cfg.correctness_threshold) {
            return invalid(format!(
                "correctness_threshold must be within [0, 1], got {}",
                cfg.correctness_threshold
            ));
        }

        match (cfg.mode, &cfg.weights) {
            (CompositeMode::Weighted, None) => return invalid("WEIGHTED mode requires weights".into()),
            (CompositeMode::Weighted, Some(weights)) => {
                if weights.len() != cfg.rules.len() {
                    return invalid(format!(
                        "{} weights given for {} sub-rules",
                        weights.len(),
                        cfg.rules.len()
                    ));
                }
                if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                    return invalid(format!("weights must be non-negative, got {w}"));
                }
            }
            (_, Some(_)) => {
                tracing::warn!(rule = %rule.label(), "weights ignored outside WEIGHTED mode");
            }
            (_, None) => {}
        }

        if let Some(k) = cfg.min_passing {
            if cfg.mode != CompositeMode::Or {
                return invalid("min_passing only applies to OR composites".into());
            }
            if k > cfg.rules.len() {
                return invalid(format!(
                    "min_passing {k} exceeds the {} sub-rules",
                    cfg.rules.len()
                ));
            }
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Composite(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let mut children = Vec::with_capacity(cfg.rules.len());
        for (index, child) in cfg.rules.iter().enumerate() {
            let outcome = ctx.evaluate(child)?;
            if outcome.is_applicable() {
                let weight = cfg
                    .weights
                    .as_ref()
                    .and_then(|w| w.get(index).copied())
                    .unwrap_or(1.0);
                children.push((weight, outcome));
            }
        }

        let mode = mode_name(cfg.mode);
        if children.is_empty() {
            return Ok(ScoreOutcome::not_applicable(
                rule,
                format!("Composite ({mode}): no sub-rule applies"),
            ));
        }

        let (points, max, correct) = combine(cfg, &children);
        let passed = children.iter().filter(|(_, c)| c.fully_passed()).count();

        let expected: Vec<&str> = children
            .iter()
            .filter_map(|(_, c)| c.correct_answer.as_deref())
            .collect();

        let mut outcome = ScoreOutcome::for_rule(rule, max)
            .award(points)
            .correct_if(correct)
            .with_student_answer(ctx.answer(&cfg.question_id))
            .with_feedback(format!(
                "Composite ({mode}) of {} sub-rules - {passed}/{} passed",
                children.len(),
                children.len()
            ));
        if !expected.is_empty() {
            outcome = outcome.with_correct_answer(expected.join(", "));
        }
        Ok(outcome)
    }
}
