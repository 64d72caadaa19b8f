use util::rubric::{Rule, RuleKind, SimilarityAlgorithm};

use super::text::normalize;
use crate::error::MarkerError;
use crate::traits::evaluator::{EvaluationContext, RuleEvaluator, kind_mismatch};
use crate::types::ScoreOutcome;

/// Fuzzy match against one or more reference answers; the closest reference wins.
pub struct SimilarityEvaluator;

#[allow(clippy::needless_range_loop)]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut matrix = vec![vec![0usize; b_chars.len() + 1]; a_chars.len() + 1];
    for i in 0..=a_chars.len() {
        matrix[i][0] = i;
    }
    for j in 0..=b_chars.len() {
        matrix[0][j] = j;
    }

    for i in 1..=a_chars.len() {
        for j in 1..=b_chars.len() {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = std::cmp::min(
                std::cmp::min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1),
                matrix[i - 1][j - 1] + cost,
            );
        }
    }

    matrix[a_chars.len()][b_chars.len()]
}

/// `1 - distance / longest length`, in `[0, 1]`.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

pub fn jaro(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(b.len());
        for j in start..end {
            if !b_matched[j] && b[j] == *ca {
                a_matched[i] = true;
                b_matched[j] = true;
                matches += 1;
                break;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let a_seq = a.iter().zip(&a_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let b_seq = b.iter().zip(&b_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let transpositions = a_seq.zip(b_seq).filter(|(x, y)| x != y).count() / 2;

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64) / m) / 3.0
}

/// Jaro similarity boosted by a shared prefix of up to four characters.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let j = jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(4)
        .take_while(|(x, y)| x == y)
        .count();
    j + prefix as f64 * 0.1 * (1.0 - j)
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Word-order-insensitive ratio: sort the words of both strings, then compare
/// with an insert/delete edit ratio.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut words: Vec<&str> = s.split_whitespace().collect();
        words.sort_unstable();
        words.join(" ").chars().collect::<Vec<char>>()
    };
    let (a, b) = (sorted(a), sorted(b));
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

pub fn similarity(algorithm: SimilarityAlgorithm, a: &str, b: &str) -> f64 {
    let score = match algorithm {
        SimilarityAlgorithm::Levenshtein => levenshtein_similarity(a, b),
        SimilarityAlgorithm::JaroWinkler => jaro_winkler(a, b),
        SimilarityAlgorithm::TokenSort => token_sort_ratio(a, b),
    };
    score.clamp(0.0, 1.0)
}

impl RuleEvaluator for SimilarityEvaluator {
    fn kind(&self) -> RuleKind {
        RuleKind::Similarity
    }

    fn validate(&self, rule: &Rule) -> Result<(), MarkerError> {
        let Rule::Similarity(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };
        if cfg.reference_answers.is_empty() {
            return Err(MarkerError::invalid_rule(rule.label(), "reference_answers is empty"));
        }
        if !(0.0..=1.0).contains(&cfg.threshold) {
            return Err(MarkerError::invalid_rule(
                rule.label(),
                format!("threshold must be within [0, 1], got {}", cfg.threshold),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, rule: &Rule, ctx: &EvaluationContext<'_>) -> Result<ScoreOutcome, MarkerError> {
        let Rule::Similarity(cfg) = rule else {
            return Err(kind_mismatch(rule, self.kind()));
        };

        let raw = ctx.answer(&cfg.question_id);
        let answer = normalize(raw, cfg.case_sensitive, true);

        // first reference wins ties
        let mut best: Option<(f64, &str)> = None;
        for reference in &cfg.reference_answers {
            let score = similarity(cfg.algorithm, &answer, &normalize(reference, cfg.case_sensitive, true));
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, reference.as_str()));
            }
        }
        let (score, reference) = best.unwrap_or((0.0, ""));

        let passed = score >= cfg.threshold;
        let points = if passed {
            cfg.max_points
        } else if cfg.partial_credit {
            cfg.max_points * score
        } else {
            0.0
        };

        let feedback = if passed {
            format!("Match: {:.0}% (threshold: {:.0}%)", score * 100.0, cfg.threshold * 100.0)
        } else {
            format!(
                "Insufficient similarity: {:.0}% < {:.0}%",
                score * 100.0,
                cfg.threshold * 100.0
            )
        };

        Ok(ScoreOutcome::for_rule(rule, cfg.max_points)
            .award(points)
            .correct_if(passed)
            .with_student_answer(raw)
            .with_correct_answer(reference)
            .with_feedback(feedback))
    }
}
