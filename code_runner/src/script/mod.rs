//! A small, capability-free scripting language for custom scoring logic.
//!
//! Scripts see four read-only inputs (`answer`, `answers`, `question_id`,
//! `max_points`) and report back through `score` and `feedback`:
//!
//! ```text
//! # full marks when every keyword appears
//! let needed = ["mitochondria", "atp"]
//! let hits = 0
//! for word in needed {
//!     if word in lower(answer) { hits += 1 }
//! }
//! score = max_points * hits / len(needed)
//! feedback = str(hits) + " of " + str(len(needed)) + " keywords"
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::ScriptError;
pub use interpreter::{Budget, Interpreter, ScriptInputs, ScriptOutputs};
pub use parser::parse;
pub use value::Value;
