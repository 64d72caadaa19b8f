//! Sandboxed execution of user-supplied scoring scripts.
//!
//! Scripts are written in a small restricted language (see [`script`]) that has
//! no way to reach files, the network, processes, the environment or the clock.
//! [`run_script`] validates a script, runs it on a watchdog-supervised worker
//! thread under the time, step and memory ceilings of
//! [`ScriptLimits`](util::execution_config::ScriptLimits), and always converges
//! on a finalized [`ScriptOutcome`].

pub mod error;
pub mod sandbox;
pub mod script;
pub mod validate_script;

pub use error::SandboxError;
pub use sandbox::{Execution, ScriptOutcome, ScriptRequest, ScriptState, run_script};
pub use script::ScriptInputs;
pub use validate_script::{ScriptValidationError, validate_script};
