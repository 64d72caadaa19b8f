//! # Cross-question Evaluators
//!
//! Rules that read several answers of the same submission at once.
//!
//! - [`conditional`]: grade one question only when another has a given answer.
//! - [`assumption_set`]: grade a group of questions against alternative answer keys.
//!
//! Both compare answers exactly, without trimming or case folding.

pub mod assumption_set;
pub mod conditional;

pub use assumption_set::AssumptionSetEvaluator;
pub use conditional::ConditionalEvaluator;
