use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Resource ceilings applied to every scoring script run by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptLimits {
    /// Wall-clock budget for one script run, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Memory ceiling for values held by one script run, in KiB.
    #[serde(default = "default_memory_kb")]
    pub memory_kb: u64,

    /// Interpreter steps (statements, loop iterations, calls) allowed per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,

    #[serde(default = "default_max_script_lines")]
    pub max_script_lines: usize,

    /// Extra time the watchdog grants a worker to wind down after the deadline.
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            memory_kb: default_memory_kb(),
            max_steps: default_max_steps(),
            max_script_bytes: default_max_script_bytes(),
            max_script_lines: default_max_script_lines(),
            teardown_grace_ms: default_teardown_grace_ms(),
        }
    }
}

impl ScriptLimits {
    /// Replaces zero budgets with the defaults so a misconfigured limit never
    /// disables a script entirely.
    pub fn sanitize(mut self) -> Self {
        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
        if self.memory_kb == 0 {
            self.memory_kb = default_memory_kb();
        }
        if self.max_steps == 0 {
            self.max_steps = default_max_steps();
        }
        if self.max_script_bytes == 0 {
            self.max_script_bytes = default_max_script_bytes();
        }
        if self.max_script_lines == 0 {
            self.max_script_lines = default_max_script_lines();
        }
        self
    }

    /// Applies per-rule overrides on top of these limits.
    pub fn with_overrides(mut self, timeout_ms: Option<u64>, memory_kb: Option<u64>) -> Self {
        if let Some(t) = timeout_ms.filter(|t| *t > 0) {
            self.timeout_ms = t;
        }
        if let Some(m) = memory_kb.filter(|m| *m > 0) {
            self.memory_kb = m;
        }
        self
    }

    pub fn memory_bytes(&self) -> usize {
        usize::try_from(self.memory_kb.saturating_mul(1024)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GradingOptions {
    /// Number of grading threads. `0` uses one per available CPU.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub script_limits: ScriptLimits,
}

impl Default for GradingOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            script_limits: ScriptLimits::default(),
        }
    }
}

impl GradingOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let script_limits = ScriptLimits {
            timeout_ms: cfg.script_timeout_ms,
            memory_kb: cfg.script_memory_kb,
            max_steps: cfg.script_max_steps,
            ..ScriptLimits::default()
        }
        .sanitize();

        Self {
            workers: cfg.grading_workers,
            script_limits,
        }
    }

    /// Resolves `workers` to a concrete thread count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

//Default Functions

pub fn default_timeout_ms() -> u64 {
    5_000
}

pub fn default_memory_kb() -> u64 {
    51_200
}

pub fn default_max_steps() -> u64 {
    5_000_000
}

fn default_max_script_bytes() -> usize {
    50_000
}

fn default_max_script_lines() -> usize {
    1_000
}

fn default_teardown_grace_ms() -> u64 {
    250
}

fn default_workers() -> usize {
    0
}
