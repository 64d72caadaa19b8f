use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("runtime error on line {line}: {message}")]
    Runtime { line: usize, message: String },

    #[error("script raised an error on line {line}: {message}")]
    Raised { line: usize, message: String },

    #[error("step budget of {0} exhausted")]
    StepLimit(u64),

    #[error("deadline exceeded")]
    Deadline,

    #[error("execution cancelled")]
    Cancelled,

    #[error("memory limit exceeded: needed {needed} bytes of {limit}")]
    Memory { needed: usize, limit: usize },
}

impl ScriptError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            line,
            message: message.into(),
        }
    }

    /// True for errors caused by running out of time or steps.
    pub fn is_time_exhaustion(&self) -> bool {
        matches!(
            self,
            ScriptError::StepLimit(_) | ScriptError::Deadline | ScriptError::Cancelled
        )
    }
}
