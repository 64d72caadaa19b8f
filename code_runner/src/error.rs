use thiserror::Error;

use crate::sandbox::ScriptState;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to start sandbox worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("illegal sandbox transition from {from} to {to}")]
    InvalidTransition { from: ScriptState, to: ScriptState },
}
