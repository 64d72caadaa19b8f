//! # Evaluators
//!
//! Single-question evaluators. Each one is a pure function of the rule and
//! the answer it reads, and reports every problem with the answer as a
//! zero-point [`ScoreOutcome`](crate::types::ScoreOutcome).
//!
//! - [`exact_match`]: normalised string equality.
//! - [`numeric_range`]: inclusive numeric bounds.
//! - [`multiple_choice`]: comma or semicolon separated choice sets.
//! - [`length`]: character or word count limits.
//! - [`keyword`]: required substrings.
//! - [`regex`]: pattern matching with precompiled patterns.
//! - [`similarity`]: fuzzy matching against reference answers.
//! - [`programmable`]: scoring scripts run in the sandbox.

pub mod exact_match;
pub mod keyword;
pub mod length;
pub mod multiple_choice;
pub mod numeric_range;
pub mod programmable;
pub mod regex;
pub mod similarity;
pub mod text;

pub use exact_match::ExactMatchEvaluator;
pub use keyword::KeywordEvaluator;
pub use length::LengthEvaluator;
pub use multiple_choice::MultipleChoiceEvaluator;
pub use numeric_range::NumericRangeEvaluator;
pub use programmable::ProgrammableEvaluator;
pub use regex::RegexEvaluator;
pub use similarity::SimilarityEvaluator;
