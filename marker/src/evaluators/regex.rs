//! Pattern matching with patterns compiled once per rubric.
//!
//! Patterns are compiled during validation and kept in a cache shared by all
//! grading threads, so each submission only pays for the match itself.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;
use util::rubric::{RegexMatchMode, RegexRule, Rule, RuleKind};

use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::{FailureKind, ScoreOutcome};

#[derive(Default)]
pub struct RegexEvaluator {
    compiled: RwLock<HashMap<String, Regex>>,
}

/// Prefix `pattern` with the inline flags the rule asks for.
fn with_flags(cfg: &RegexRule, pattern: &str) -> String {
    let mut flags = String::new();
    if !cfg.case_sensitive {
        flags.push('i');
    }
    if cfg.multiline {
        flags.push('m');
    }
    if cfg.dotall {
        flags.push('s');
    }
    if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    }
}

impl RegexEvaluator {
    fn compile(&self, source: String) -> Result<Regex, regex::Error> {
        {
            let cache = self.compiled.read().unwrap_or_else(|p| p.into_inner());
            if let Some(re) = cache.get(&source) {
                return Ok(re.clone());
            }
        }
        let re = Regex::new(&source)?;
        self.compiled
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(source, re.clone());
        Ok(re)
    }

    pub fn cached_patterns(&self) -> usize {
        self.compiled.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl RuleEvaluator for RegexEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Regex
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Regex(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if cfg.patterns.is_empty() {
            return Err(MarkerError::invalid_rule(rule.label(), "patterns is empty"));
        }
        for pattern in &cfg.patterns {
            self.compile(with_flags(cfg, pattern)).map_err(|e| {
                MarkerError::invalid_rule(rule.label(), format!("invalid pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Regex(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let answer = ctx.answer(&cfg.question_id);
        let mut matched = 0usize;
        for pattern in &cfg.patterns {
            match self.compile(with_flags(cfg, pattern)) {
                Ok(re) => {
                    if re.is_match(answer) {
                        matched += 1;
                    }
                }
                Err(e) => {
                    return Ok(ScoreOutcome::failed(
                        rule,
                        FailureKind::EvaluationError,
                        format!("Invalid regex pattern '{pattern}': {e}"),
                    )
                    .with_student_answer(answer));
                }
            }
        }

        let total = cfg.patterns.len();
        let fraction = if total == 0 { 0.0 } else { matched as f64 / total as f64 };
        let all = total > 0 && matched == total;

        let points = match cfg.match_mode {
            RegexMatchMode::All if all => cfg.max_points,
            RegexMatchMode::All if cfg.partial_credit => cfg.max_points * fraction,
            RegexMatchMode::All => 0.0,
            RegexMatchMode::Any if matched > 0 => cfg.max_points,
            RegexMatchMode::Any => 0.0,
            RegexMatchMode::Count => cfg.max_points * fraction,
        };

        let feedback = if all {
            format!("Matched all {total} pattern(s)")
        } else if matched > 0 {
            format!("Partial: matched {matched}/{total} pattern(s)")
        } else {
            "No patterns matched".to_string()
        };

        Ok(ScoreOutcome::for_rule(rule, cfg.max_points)
            .award(points)
            .with_student_answer(answer)
            .with_feedback(feedback))
    }
}
