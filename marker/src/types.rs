//! # Types Module
//!
//! [`ScoreOutcome`] is the result of evaluating one rule against one
//! submission. Outcomes are built fresh for every (rule, submission) pair and
//! never shared between submissions.

use serde::{Deserialize, Serialize};
use util::rubric::Rule;

/// Tolerance used when deciding whether a rule awarded its full points.
pub const EPSILON: f64 = 1e-9;

/// Why an outcome scored zero without the answer being judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The answer could not be interpreted (e.g. a non-numeric value).
    EvaluationError,
    /// The scoring script failed or produced no usable score.
    ScriptError,
    Timeout,
    MemoryExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub rule_id: String,
    pub question_id: String,
    pub points_awarded: f64,
    pub max_points: f64,
    /// `None` when the rule did not apply to this submission.
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Clamp `points` into `[0, max]`, treating NaN as zero.
pub fn clamp_points(points: f64, max: f64) -> f64 {
    let max = if max.is_finite() { max.max(0.0) } else { 0.0 };
    if points.is_nan() {
        return 0.0;
    }
    points.clamp(0.0, max)
}

impl ScoreOutcome {
    /// A zero-point, incorrect outcome for `rule` worth `max_points`.
    pub fn for_rule(rule: &Rule, max_points: f64) -> Self {
        Self {
            rule_id: rule.label(),
            question_id: rule.primary_question().to_string(),
            points_awarded: 0.0,
            max_points: clamp_points(max_points, f64::MAX),
            is_correct: Some(false),
            feedback: String::new(),
            student_answer: None,
            correct_answer: None,
            failure: None,
        }
    }

    /// Outcome for a rule whose precondition did not hold. Excluded from
    /// both sides of the totals.
    pub fn not_applicable(rule: &Rule, feedback: impl Into<String>) -> Self {
        Self {
            is_correct: None,
            feedback: feedback.into(),
            ..Self::for_rule(rule, rule.declared_max_points())
        }
    }

    /// Zero-point outcome for an answer or script that could not be judged.
    pub fn failed(rule: &Rule, kind: FailureKind, feedback: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
            failure: Some(kind),
            ..Self::for_rule(rule, rule.declared_max_points())
        }
    }

    /// Award `points` (clamped) and mark the outcome correct iff the award is full.
    pub fn award(mut self, points: f64) -> Self {
        self.points_awarded = clamp_points(points, self.max_points);
        self.is_correct = Some(self.is_full());
        self
    }

    pub fn correct_if(mut self, correct: bool) -> Self {
        self.is_correct = Some(correct);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn with_question(mut self, question_id: impl Into<String>) -> Self {
        self.question_id = question_id.into();
        self
    }

    pub fn with_student_answer(mut self, answer: impl Into<String>) -> Self {
        self.student_answer = Some(answer.into());
        self
    }

    pub fn with_correct_answer(mut self, answer: impl Into<String>) -> Self {
        self.correct_answer = Some(answer.into());
        self
    }

    pub fn is_applicable(&self) -> bool {
        self.is_correct.is_some()
    }

    fn is_full(&self) -> bool {
        self.points_awarded + EPSILON >= self.max_points
    }

    /// Applicable and awarded every available point.
    pub fn fully_passed(&self) -> bool {
        self.is_applicable() && self.is_full()
    }

    /// `points / max`, or 0 when the rule is worth nothing.
    pub fn normalized(&self) -> f64 {
        if self.max_points > 0.0 {
            (self.points_awarded / self.max_points).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Round a float to two decimal places.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::rubric::{ConditionalRule, ExactMatchRule};

    fn exact(max: f64) -> Rule {
        Rule::ExactMatch(ExactMatchRule {
            question_id: "Q1".into(),
            correct_answer: "Paris".into(),
            max_points: max,
            case_sensitive: false,
            trim_whitespace: true,
            description: None,
        })
    }

    #[test]
    fn award_clamps_into_range() {
        let rule = exact(10.0);
        assert_eq!(ScoreOutcome::for_rule(&rule, 10.0).award(15.0).points_awarded, 10.0);
        assert_eq!(ScoreOutcome::for_rule(&rule, 10.0).award(-3.0).points_awarded, 0.0);
        assert_eq!(ScoreOutcome::for_rule(&rule, 10.0).award(f64::NAN).points_awarded, 0.0);
    }

    #[test]
    fn award_sets_correctness() {
        let rule = exact(10.0);
        assert_eq!(ScoreOutcome::for_rule(&rule, 10.0).award(10.0).is_correct, Some(true));
        assert_eq!(ScoreOutcome::for_rule(&rule, 10.0).award(9.5).is_correct, Some(false));
    }

    #[test]
    fn labels_and_questions_come_from_the_rule() {
        let outcome = ScoreOutcome::for_rule(&exact(10.0), 10.0);
        assert_eq!(outcome.rule_id, "EXACT_MATCH:Q1");
        assert_eq!(outcome.question_id, "Q1");
    }

    #[test]
    fn not_applicable_is_tri_state() {
        let rule = Rule::Conditional(ConditionalRule {
            if_question: "Q1".into(),
            if_answer: "yes".into(),
            then_question: "Q2".into(),
            then_correct_answer: "42".into(),
            max_points: 4.0,
            description: None,
        });
        let outcome = ScoreOutcome::not_applicable(&rule, "skipped");
        assert_eq!(outcome.is_correct, None);
        assert!(!outcome.is_applicable());
        assert!(!outcome.fully_passed());
        assert_eq!(outcome.points_awarded, 0.0);

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["is_correct"].is_null());
    }

    #[test]
    fn failures_are_zero_and_tagged() {
        let outcome = ScoreOutcome::failed(&exact(3.0), FailureKind::Timeout, "Script timed out");
        assert_eq!(outcome.points_awarded, 0.0);
        assert_eq!(outcome.max_points, 3.0);
        assert_eq!(outcome.failure, Some(FailureKind::Timeout));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap()["failure"],
            "timeout"
        );
    }

    #[test]
    fn normalized_handles_zero_max() {
        let outcome = ScoreOutcome::for_rule(&exact(0.0), 0.0);
        assert_eq!(outcome.normalized(), 0.0);
        assert!(outcome.fully_passed());
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(66.666_666), 66.67);
    }
}
