//! Watchdog-supervised execution of one scoring script.
//!
//! Every run walks the same state machine:
//!
//! ```text
//! Pending -> Running -> { Completed | TimedOut | MemoryExceeded | RuntimeError } -> Finalized
//! ```
//!
//! The script runs on its own worker thread. The interpreter enforces the
//! step budget, the deadline and the byte limit itself; the watchdog waits at
//! most `timeout + teardown_grace` for the worker and, if it has not reported
//! by then, raises the cancellation flag and records a timeout without
//! waiting any longer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use util::execution_config::ScriptLimits;

use crate::error::SandboxError;
use crate::script::{Budget, Interpreter, ScriptError, ScriptInputs, ScriptOutputs};
use crate::validate_script::validate_script;

const WORKER_STACK_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptState {
    Pending,
    Running,
    Completed,
    TimedOut,
    MemoryExceeded,
    RuntimeError,
    Finalized,
}

impl ScriptState {
    pub fn is_terminal_outcome(&self) -> bool {
        matches!(
            self,
            ScriptState::Completed
                | ScriptState::TimedOut
                | ScriptState::MemoryExceeded
                | ScriptState::RuntimeError
        )
    }

    pub fn can_transition_to(&self, next: ScriptState) -> bool {
        match self {
            ScriptState::Pending => next == ScriptState::Running,
            ScriptState::Running => next.is_terminal_outcome(),
            s if s.is_terminal_outcome() => next == ScriptState::Finalized,
            _ => false,
        }
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptState::Pending => "pending",
            ScriptState::Running => "running",
            ScriptState::Completed => "completed",
            ScriptState::TimedOut => "timed out",
            ScriptState::MemoryExceeded => "memory exceeded",
            ScriptState::RuntimeError => "runtime error",
            ScriptState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Tracks one run through [`ScriptState`], refusing illegal transitions.
#[derive(Debug)]
pub struct Execution {
    state: ScriptState,
    outcome: Option<ScriptState>,
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution {
    pub fn new() -> Self {
        Self {
            state: ScriptState::Pending,
            outcome: None,
        }
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }

    /// The terminal outcome reached before finalization, if any.
    pub fn outcome(&self) -> Option<ScriptState> {
        self.outcome
    }

    pub fn advance(&mut self, next: ScriptState) -> Result<(), SandboxError> {
        if !self.state.can_transition_to(next) {
            return Err(SandboxError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next.is_terminal_outcome() {
            self.outcome = Some(next);
        }
        self.state = next;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub script: String,
    pub inputs: ScriptInputs,
}

/// Result of one finalized run. `score` is already clamped to
/// `[0, max_points]` and is zero for every outcome except `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub state: ScriptState,
    pub score: f64,
    pub feedback: String,
    pub elapsed: Duration,
    pub steps: Option<u64>,
}

impl ScriptOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == ScriptState::Completed
    }
}

struct WorkerReport {
    result: Result<ScriptOutputs, ScriptError>,
    steps: u64,
    peak_bytes: usize,
}

/// Validates and runs `request` under `limits`.
///
/// Script failures of any kind come back as an `Ok` outcome with a zero score.
/// `Err` is reserved for the sandbox itself failing, such as being unable to
/// start a worker thread.
pub fn run_script(
    request: ScriptRequest,
    limits: &ScriptLimits,
) -> Result<ScriptOutcome, SandboxError> {
    let limits = limits.sanitize();
    let started = Instant::now();
    let mut execution = Execution::new();
    let max_points = request.inputs.max_points.max(0.0);

    let program = match validate_script(&request.script, &limits) {
        Ok(program) => program,
        Err(err) => {
            execution.advance(ScriptState::Running)?;
            return finalize(
                execution,
                ScriptState::RuntimeError,
                0.0,
                format!("Script error: {err}"),
                started,
                None,
            );
        }
    };

    execution.advance(ScriptState::Running)?;

    let timeout = Duration::from_millis(limits.timeout_ms);
    let grace = Duration::from_millis(limits.teardown_grace_ms);
    let budget = Budget {
        max_steps: limits.max_steps,
        memory_bytes: limits.memory_bytes(),
        deadline: started + timeout,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (tx, rx) = mpsc::channel();
    let inputs = request.inputs;

    thread::Builder::new()
        .name("script-sandbox".into())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(move || {
            let mut interpreter = Interpreter::new(budget, &worker_cancel);
            let result = interpreter.run(&program, &inputs);
            // the watchdog may already have given up on us
            let _ = tx.send(WorkerReport {
                result,
                steps: interpreter.steps(),
                peak_bytes: interpreter.peak_bytes(),
            });
        })
        .map_err(SandboxError::Spawn)?;

    match rx.recv_timeout(timeout + grace) {
        Ok(report) => {
            tracing::debug!(
                steps = report.steps,
                peak_bytes = report.peak_bytes,
                "Script worker reported"
            );
            let steps = Some(report.steps);
            match report.result {
                Ok(outputs) => {
                    let score = outputs.score.clamp(0.0, max_points);
                    if score != outputs.score {
                        tracing::debug!(raw = outputs.score, clamped = score, "Clamped script score");
                    }
                    finalize(
                        execution,
                        ScriptState::Completed,
                        score,
                        outputs.feedback,
                        started,
                        steps,
                    )
                }
                Err(err) if err.is_time_exhaustion() => finalize(
                    execution,
                    ScriptState::TimedOut,
                    0.0,
                    format!("Script timed out after {} ms ({err})", limits.timeout_ms),
                    started,
                    steps,
                ),
                Err(ScriptError::Memory { needed, limit }) => finalize(
                    execution,
                    ScriptState::MemoryExceeded,
                    0.0,
                    format!(
                        "Script exceeded memory limit of {} KB (needed {} KB)",
                        limit / 1024,
                        needed.div_ceil(1024)
                    ),
                    started,
                    steps,
                ),
                Err(err) => finalize(
                    execution,
                    ScriptState::RuntimeError,
                    0.0,
                    format!("Script error: {err}"),
                    started,
                    steps,
                ),
            }
        }
        Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            finalize(
                execution,
                ScriptState::TimedOut,
                0.0,
                format!("Script timed out after {} ms", limits.timeout_ms),
                started,
                None,
            )
        }
        Err(RecvTimeoutError::Disconnected) => finalize(
            execution,
            ScriptState::RuntimeError,
            0.0,
            "Script error: sandbox worker stopped unexpectedly".to_string(),
            started,
            None,
        ),
    }
}

fn finalize(
    mut execution: Execution,
    terminal: ScriptState,
    score: f64,
    feedback: String,
    started: Instant,
    steps: Option<u64>,
) -> Result<ScriptOutcome, SandboxError> {
    execution.advance(terminal)?;
    execution.advance(ScriptState::Finalized)?;

    let elapsed = started.elapsed();
    match terminal {
        ScriptState::TimedOut | ScriptState::MemoryExceeded => {
            tracing::warn!(state = %terminal, elapsed_ms = elapsed.as_millis() as u64, "Script terminated");
        }
        ScriptState::RuntimeError => {
            tracing::warn!(%feedback, "Script failed");
        }
        _ => {}
    }

    Ok(ScriptOutcome {
        state: terminal,
        score,
        feedback,
        elapsed,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_happy_path() {
        let mut exec = Execution::new();
        exec.advance(ScriptState::Running).unwrap();
        exec.advance(ScriptState::Completed).unwrap();
        exec.advance(ScriptState::Finalized).unwrap();
        assert_eq!(exec.state(), ScriptState::Finalized);
        assert_eq!(exec.outcome(), Some(ScriptState::Completed));
    }

    #[test]
    fn rejects_skipping_running() {
        let mut exec = Execution::new();
        let err = exec.advance(ScriptState::Completed).unwrap_err();
        assert!(matches!(
            err,
            SandboxError::InvalidTransition {
                from: ScriptState::Pending,
                to: ScriptState::Completed
            }
        ));
    }

    #[test]
    fn terminal_states_are_not_reentrant() {
        let mut exec = Execution::new();
        exec.advance(ScriptState::Running).unwrap();
        exec.advance(ScriptState::TimedOut).unwrap();
        assert!(exec.advance(ScriptState::Completed).is_err());
        exec.advance(ScriptState::Finalized).unwrap();
        assert!(exec.advance(ScriptState::Running).is_err());
        assert!(exec.advance(ScriptState::Finalized).is_err());
    }

    #[test]
    fn every_outcome_can_only_finalize() {
        for outcome in [
            ScriptState::Completed,
            ScriptState::TimedOut,
            ScriptState::MemoryExceeded,
            ScriptState::RuntimeError,
        ] {
            assert!(ScriptState::Running.can_transition_to(outcome));
            assert!(outcome.can_transition_to(ScriptState::Finalized));
            assert!(!outcome.can_transition_to(ScriptState::Running));
        }
    }
}
