//! Traits Module
//!
//! - [`evaluator`]: the [`RuleEvaluator`](evaluator::RuleEvaluator) strategy
//!   trait every rule type is graded through, and the per-submission
//!   [`EvaluationContext`](evaluator::EvaluationContext) it receives.

pub mod evaluator;
