use util::rubric::{KeywordMode, Rule, RuleKind};

use super::text::normalize;
use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Scores an answer by which of the configured keywords it contains.
pub struct KeywordEvaluator;

fn feedback(mode: KeywordMode, found: &[&str], missing: &[&str]) -> String {
    let mut parts = Vec::new();
    match mode {
        KeywordMode::All => {
            if !missing.is_empty() {
                parts.push(format!("Missing keywords: {}", missing.join(", ")));
            } else if !found.is_empty() {
                parts.push("Found all keywords".to_string());
            }
        }
        KeywordMode::Partial => {
            if !found.is_empty() {
                parts.push(format!("Found keywords: {}", found.join(", ")));
            }
            if !missing.is_empty() {
                parts.push(format!("Missing keywords: {}", missing.join(", ")));
            }
        }
        KeywordMode::Any => {
            if found.is_empty() {
                parts.push("No required keywords found".to_string());
            } else {
                parts.push(format!("Found keyword(s): {}", found.join(", ")));
            }
        }
    }
    if parts.is_empty() {
        "No keywords found".to_string()
    } else {
        parts.join("; ")
    }
}

impl RuleEvaluator for KeywordEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Keyword
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Keyword(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if cfg.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(MarkerError::invalid_rule(rule.label(), "keywords is empty"));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Keyword(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let raw = ctx.answer(&cfg.question_id);
        let answer = normalize(raw, cfg.case_sensitive, cfg.trim_whitespace);

        let (found, missing): (Vec<&str>, Vec<&str>) = cfg
            .keywords
            .iter()
            .map(String::as_str)
            .partition(|kw| {
                let kw = normalize(kw, cfg.case_sensitive, cfg.trim_whitespace);
                !kw.is_empty() && answer.contains(&kw)
            });

        let total = cfg.keywords.len();
        let points = if total == 0 {
            0.0
        } else {
            match cfg.mode {
                KeywordMode::All if found.len() == total => cfg.max_points,
                KeywordMode::All => 0.0,
                KeywordMode::Any if !found.is_empty() => cfg.max_points,
                KeywordMode::Any => 0.0,
                KeywordMode::Partial => cfg.max_points / total as f64 * found.len() as f64,
            }
        };

        Ok(ScoreOutcome::for_rule(rule, cfg.max_points)
            .award(points)
            .with_student_answer(raw)
            .with_correct_answer(format!("Keywords: {}", cfg.keywords.join(", ")))
            .with_feedback(feedback(cfg.mode, &found, &missing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::grade;
    use util::rubric::KeywordRule;

    fn rule(mode: KeywordMode) -> Rule {
        Rule::Keyword(KeywordRule {
            question_id: "Q1".into(),
            keywords: vec!["ownership".into(), "borrow".into(), "lifetime".into(), "trait".into()],
            max_points: 8.0,
            mode,
            case_sensitive: false,
            trim_whitespace: true,
            description: None,
        })
    }

    const ANSWER: &str = "Ownership and BORROWING rules";

    #[test]
    fn all_mode_requires_every_keyword() {
        let outcome = grade(&rule(KeywordMode::All), &[("Q1", ANSWER)]);
        assert_eq!(outcome.points_awarded, 0.0);
        assert_eq!(outcome.feedback, "Missing keywords: lifetime, trait");
    }

    #[test]
    fn any_mode_needs_one_keyword() {
        let outcome = grade(&rule(KeywordMode::Any), &[("Q1", ANSWER)]);
        assert_eq!(outcome.points_awarded, 8.0);
        assert_eq!(outcome.is_correct, Some(true));
    }

    #[test]
    fn partial_mode_awards_per_keyword() {
        let outcome = grade(&rule(KeywordMode::Partial), &[("Q1", ANSWER)]);
        assert_eq!(outcome.points_awarded, 4.0);
        assert_eq!(
            outcome.feedback,
            "Found keywords: ownership, borrow; Missing keywords: lifetime, trait"
        );
    }

    #[test]
    fn blank_keyword_lists_fail_validation() {
        let bad = Rule::Keyword(KeywordRule {
            question_id: "Q1".into(),
            keywords: vec![" ".into()],
            max_points: 1.0,
            mode: KeywordMode::All,
            case_sensitive: false,
            trim_whitespace: true,
            description: None,
        });
        assert!(KeywordEvaluator.validate(&bad).is_err());
    }
}
