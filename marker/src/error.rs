//! Marker Error Types
//!
//! [`MarkerError`] covers everything that stops a grading run: rubric
//! configuration problems found by validation and failures to read or write
//! the files the CLI works with. Problems with a single answer or a single
//! script never surface here; evaluators turn those into zero-point
//! [`ScoreOutcome`](crate::types::ScoreOutcome)s instead.

use thiserror::Error;
use util::document::DocumentError;
use util::rubric::RuleKind;

#[derive(Debug, Error)]
pub enum MarkerError {
    /// No evaluator is registered for a rule's `type`.
    #[error("no evaluator registered for rule type {0}")]
    UnknownRuleType(RuleKind),

    /// A rule's configuration cannot be evaluated as written.
    #[error("{rule}: {message}")]
    InvalidRule { rule: String, message: String },

    /// Composite nesting deeper than the dispatcher will follow.
    #[error("{rule}: rules nested deeper than {limit} levels")]
    RuleTooDeep { rule: String, limit: usize },

    /// A programmable rule whose script fails load-time checks.
    #[error("{rule}: invalid script: {message}")]
    InvalidScript { rule: String, message: String },

    /// Every problem found while validating a rubric.
    #[error("rubric failed validation:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to start grading workers: {0}")]
    WorkerPool(String),
}

impl MarkerError {
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        MarkerError::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
