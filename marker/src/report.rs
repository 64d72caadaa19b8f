//! # Grade Report Module
//!
//! Serializable results of a grading run. Nothing here is used for grading
//! itself; these types exist so results can be written as JSON or YAML.
//!
//! ```json
//! {
//!   "results": [
//!     {
//!       "student_id": "s1",
//!       "total_points": 15.0,
//!       "max_points": 20.0,
//!       "percentage": 75.0,
//!       "details": [ { "rule_id": "EXACT_MATCH:Q1", "points_awarded": 10.0, ... } ]
//!     }
//!   ],
//!   "metadata": { "rubric_name": "Quiz 1", "total_submissions": 1, "graded_at": "..." }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ScoreOutcome, round2};

/// Grading result for one submission.
///
/// Totals only count outcomes that applied to the submission; an unmet
/// conditional adds nothing to either `total_points` or `max_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_id: String,
    pub total_points: f64,
    pub max_points: f64,
    pub percentage: f64,
    pub details: Vec<ScoreOutcome>,
}

impl StudentResult {
    pub fn from_outcomes(student_id: impl Into<String>, details: Vec<ScoreOutcome>) -> Self {
        let (total_points, max_points) = details
            .iter()
            .filter(|d| d.is_applicable())
            .fold((0.0, 0.0), |(points, max), d| {
                (points + d.points_awarded, max + d.max_points)
            });
        Self {
            student_id: student_id.into(),
            total_points,
            max_points,
            percentage: percentage(total_points, max_points),
            details,
        }
    }

    /// One-line summary with values rounded for display.
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} ({}%)",
            self.student_id,
            round2(self.total_points),
            round2(self.max_points),
            round2(self.percentage)
        )
    }
}

/// `100 * total / max`, or 0 when nothing was available.
pub fn percentage(total: f64, max: f64) -> f64 {
    if max > 0.0 { 100.0 * total / max } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeMetadata {
    pub rubric_name: String,
    pub total_submissions: usize,
    pub graded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeOutput {
    pub results: Vec<StudentResult>,
    pub metadata: GradeMetadata,
}

impl GradeOutput {
    pub fn new(rubric_name: impl Into<String>, results: Vec<StudentResult>) -> Self {
        let total_submissions = results.len();
        Self {
            results,
            metadata: GradeMetadata {
                rubric_name: rubric_name.into(),
                total_submissions,
                graded_at: Utc::now(),
            },
        }
    }

    pub fn result_for(&self, student_id: &str) -> Option<&StudentResult> {
        self.results.iter().find(|r| r.student_id == student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn outcome(points: f64, max: f64, correct: Option<bool>) -> ScoreOutcome {
        ScoreOutcome {
            rule_id: "EXACT_MATCH:Q1".into(),
            question_id: "Q1".into(),
            points_awarded: points,
            max_points: max,
            is_correct: correct,
            feedback: String::new(),
            student_answer: None,
            correct_answer: None,
            failure: None,
        }
    }

    #[test]
    fn totals_skip_inapplicable_outcomes() {
        let result = StudentResult::from_outcomes(
            "s1",
            vec![
                outcome(10.0, 10.0, Some(true)),
                outcome(0.0, 5.0, None),
                outcome(2.0, 10.0, Some(false)),
            ],
        );
        assert_eq!(result.total_points, 12.0);
        assert_eq!(result.max_points, 20.0);
        assert_eq!(result.percentage, 60.0);
        assert_eq!(result.details.len(), 3);
    }

    #[test]
    fn percentage_is_zero_without_points() {
        let result = StudentResult::from_outcomes("s1", vec![]);
        assert_eq!(result.percentage, 0.0);
        assert_eq!(percentage(3.0, 0.0), 0.0);
    }

    #[test]
    fn summary_rounds_for_display() {
        let result = StudentResult::from_outcomes("s1", vec![outcome(2.0, 3.0, Some(false))]);
        assert_eq!(result.summary(), "s1: 2/3 (66.67%)");
    }

    #[test]
    fn serializes_metadata() {
        let output = GradeOutput::new(
            "Quiz",
            vec![StudentResult::from_outcomes("s1", vec![outcome(1.0, 1.0, Some(true))])],
        );
        let value: Value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["metadata"]["rubric_name"], "Quiz");
        assert_eq!(value["metadata"]["total_submissions"], 1);
        assert!(value["metadata"]["graded_at"].is_string());
        assert_eq!(value["results"][0]["details"][0]["is_correct"], true);
        assert!(output.result_for("s1").is_some());
        assert!(output.result_for("s2").is_none());
    }
}
