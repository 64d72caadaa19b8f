//! # Marker Library
//!
//! Rubric-driven grading of student submissions.
//!
//! A [`Rubric`] is an ordered list of rules. Each rule is dispatched by its
//! type to a [`RuleEvaluator`] held in a [`Registry`], producing one
//! [`ScoreOutcome`] per top-level rule. Composite rules recurse back through
//! the registry, cross-question rules read several answers at once, and
//! programmable rules run a scoring script inside the `code-runner` sandbox.
//!
//! ## Key Concepts
//! - **GradingJob**: validates a rubric once, then grades many submissions in parallel.
//! - **Registry**: rule type to evaluator map, write-once and shared read-only.
//! - **ScoreOutcome**: points, feedback and correctness for one rule, never an error.
//! - **GradeOutput**: per-student totals plus run metadata, ready to serialize.

pub mod composite;
pub mod cross_question;
pub mod error;
pub mod evaluators;
pub mod export;
pub mod registry;
pub mod report;
pub mod scorer;
pub mod traits;
pub mod types;

pub use crate::error::MarkerError;
pub use crate::registry::Registry;
pub use crate::report::{GradeMetadata, GradeOutput, StudentResult};
pub use crate::scorer::grade_submission;
pub use crate::traits::evaluator::{EvaluationContext, RuleEvaluator};
pub use crate::types::{FailureKind, ScoreOutcome};

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use util::config::AppConfig;
use util::execution_config::GradingOptions;
use util::rubric::Rubric;
use util::submission::Submission;

type ProgressFn<'a> = Box<dyn Fn(usize, usize) + Send + Sync + 'a>;

/// A grading run of one rubric over a batch of submissions.
///
/// # Example
///
/// ```ignore
/// let output = GradingJob::new(&rubric)
///     .with_options(GradingOptions { workers: 4, ..Default::default() })
///     .with_progress(|done, total| println!("{done}/{total}"))
///     .grade(&submissions)?;
/// ```
pub struct GradingJob<'a> {
    rubric: &'a Rubric,
    registry: &'a Registry,
    options: GradingOptions,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> GradingJob<'a> {
    /// Creates a job using the global registry and default options.
    pub fn new(rubric: &'a Rubric) -> Self {
        Self {
            rubric,
            registry: registry::global(),
            options: GradingOptions::default(),
            progress: None,
        }
    }

    pub fn with_registry(mut self, registry: &'a Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: GradingOptions) -> Self {
        self.options = options;
        self
    }

    /// Called with `(graded, total)` after each submission finishes.
    ///
    /// Submissions finish in any order, so `graded` counts completions rather
    /// than positions.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Validates the rubric, then grades every submission.
    ///
    /// Results are returned in the same order as `submissions`.
    ///
    /// # Errors
    /// - [`MarkerError::Validation`] if the rubric fails validation; nothing is graded.
    /// - [`MarkerError::WorkerPool`] if the worker threads cannot be started.
    pub fn grade(self, submissions: &[Submission]) -> Result<GradeOutput, MarkerError> {
        self.registry
            .validate_rubric_with(self.rubric, &self.options.script_limits)?;

        let workers = self.options.effective_workers();
        let total = submissions.len();
        let started = Instant::now();
        tracing::info!(
            rubric = %self.rubric.name,
            rules = self.rubric.rules.len(),
            submissions = total,
            workers,
            "Grading started"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("grader-{i}"))
            .build()
            .map_err(|e| MarkerError::WorkerPool(e.to_string()))?;

        let graded = AtomicUsize::new(0);
        let script_limits = self.options.script_limits;
        let results = pool.install(|| {
            submissions
                .par_iter()
                .map(|submission| {
                    let result =
                        grade_submission(self.rubric, submission, self.registry, script_limits);
                    let done = graded.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = &self.progress {
                        progress(done, total);
                    }
                    result
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        tracing::info!(
            rubric = %self.rubric.name,
            submissions = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Grading finished"
        );

        Ok(GradeOutput::new(self.rubric.name.clone(), results))
    }
}

/// Grades `submissions` with the global registry and options taken from
/// [`AppConfig`].
pub fn grade(rubric: &Rubric, submissions: &[Submission]) -> Result<GradeOutput, MarkerError> {
    let options = GradingOptions::from_config(&AppConfig::global());
    GradingJob::new(rubric).with_options(options).grade(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use util::execution_config::ScriptLimits;
    use util::rubric::{ExactMatchRule, NumericRangeRule, ProgrammableRule, Rule};

    fn rubric() -> Rubric {
        Rubric::new(
            "Geography",
            vec![
                Rule::ExactMatch(ExactMatchRule {
                    question_id: "Q1".into(),
                    correct_answer: "Paris".into(),
                    max_points: 10.0,
                    case_sensitive: false,
                    trim_whitespace: true,
                    description: None,
                }),
                Rule::NumericRange(NumericRangeRule {
                    question_id: "Q2".into(),
                    min_value: 2.0,
                    max_value: 2.5,
                    max_points: 5.0,
                    description: None,
                }),
            ],
        )
    }

    fn submissions(n: usize) -> Vec<Submission> {
        (0..n)
            .map(|i| {
                let city = if i % 2 == 0 { "paris" } else { "Lyon" };
                Submission::new(format!("s{i}"), [("Q1", city), ("Q2", "2.1")])
            })
            .collect()
    }

    fn options(workers: usize) -> GradingOptions {
        GradingOptions {
            workers,
            ..GradingOptions::default()
        }
    }

    #[test]
    fn results_keep_submission_order() {
        let subs = submissions(25);
        let output = GradingJob::new(&rubric())
            .with_options(options(4))
            .grade(&subs)
            .unwrap();

        let ids: Vec<_> = output.results.iter().map(|r| r.student_id.clone()).collect();
        let expected: Vec<_> = subs.iter().map(|s| s.student_id.clone()).collect();
        assert_eq!(ids, expected);
        assert_eq!(output.metadata.total_submissions, 25);
        assert_eq!(output.metadata.rubric_name, "Geography");
        assert_eq!(output.results[0].total_points, 15.0);
        assert_eq!(output.results[1].total_points, 5.0);
    }

    #[test]
    fn progress_reports_every_submission() {
        let seen = Mutex::new(Vec::new());
        GradingJob::new(&rubric())
            .with_options(options(2))
            .with_progress(|done, total| seen.lock().unwrap().push((done, total)))
            .grade(&submissions(6))
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (1..=6).map(|d| (d, 6)).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_rubric_grades_nothing() {
        let bad = Rubric::new(
            "Broken",
            vec![Rule::NumericRange(NumericRangeRule {
                question_id: "Q1".into(),
                min_value: 5.0,
                max_value: 1.0,
                max_points: 1.0,
                description: None,
            })],
        );
        let called = AtomicUsize::new(0);
        let err = GradingJob::new(&bad)
            .with_progress(|_, _| {
                called.fetch_add(1, Ordering::Relaxed);
            })
            .grade(&submissions(3))
            .unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)));
        assert_eq!(called.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn scripts_are_validated_against_the_job_limits() {
        let scripted = Rubric::new(
            "Scripted",
            vec![Rule::Programmable(ProgrammableRule {
                question_id: "Q1".into(),
                script: "let a = 1\nlet b = 2\nscore = a + b".into(),
                max_points: 5.0,
                timeout_ms: None,
                memory_kb: None,
                description: None,
            })],
        );
        let tight = GradingOptions {
            workers: 1,
            script_limits: ScriptLimits {
                max_script_lines: 2,
                ..ScriptLimits::default()
            },
        };

        let err = GradingJob::new(&scripted)
            .with_options(tight)
            .grade(&submissions(1))
            .unwrap_err();
        assert!(err.to_string().contains("rule #1"), "{err}");

        let output = GradingJob::new(&scripted)
            .with_options(options(1))
            .grade(&submissions(1))
            .unwrap();
        assert_eq!(output.results[0].total_points, 3.0);
    }

    #[test]
    fn custom_registry_is_used() {
        let mut registry = Registry::with_defaults();
        registry.unregister(util::rubric::RuleKind::NumericRange);
        let err = GradingJob::new(&rubric())
            .with_registry(&registry)
            .grade(&submissions(1))
            .unwrap_err();
        assert!(err.to_string().contains("NUMERIC_RANGE"));
    }

    #[test]
    fn empty_batches_are_fine() {
        let output = grade(&rubric(), &[]).unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.metadata.total_submissions, 0);
    }
}
