//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: Option<String>,
    pub log_to_stdout: bool,
    /// Worker threads used to grade submissions; `0` means one per available CPU.
    pub grading_workers: usize,
    pub script_timeout_ms: u64,
    pub script_memory_kb: u64,
    pub script_max_steps: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".into(),
            project_name: "gradeflow".into(),
            log_level: "marker=info,code_runner=info".into(),
            log_file: None,
            log_to_stdout: true,
            grading_workers: 0,
            script_timeout_ms: crate::execution_config::default_timeout_ms(),
            script_memory_kb: crate::execution_config::default_memory_kb(),
            script_max_steps: crate::execution_config::default_max_steps(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or malformed values fall back to [`AppConfig::default`].
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            env: env::var("APP_ENV").unwrap_or(defaults.env),
            project_name: env::var("PROJECT_NAME").unwrap_or(defaults.project_name),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: env::var("LOG_FILE").ok().filter(|f| !f.trim().is_empty()),
            log_to_stdout: env::var("LOG_TO_STDOUT")
                .map(|v| v != "false")
                .unwrap_or(defaults.log_to_stdout),
            grading_workers: parsed_or("GRADING_WORKERS", defaults.grading_workers),
            script_timeout_ms: parsed_or("SCRIPT_TIMEOUT_MS", defaults.script_timeout_ms),
            script_memory_kb: parsed_or("SCRIPT_MEMORY_KB", defaults.script_memory_kb),
            script_max_steps: parsed_or("SCRIPT_MAX_STEPS", defaults.script_max_steps),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered, since the configuration is plain data.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: Option<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value);
    }

    pub fn set_grading_workers(value: usize) {
        AppConfig::set_field(|cfg| cfg.grading_workers = value);
    }

    pub fn set_script_timeout_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.script_timeout_ms = value);
    }

    pub fn set_script_memory_kb(value: u64) {
        AppConfig::set_field(|cfg| cfg.script_memory_kb = value);
    }

    pub fn set_script_max_steps(value: u64) {
        AppConfig::set_field(|cfg| cfg.script_max_steps = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_vars() {
        for key in [
            "GRADING_WORKERS",
            "SCRIPT_TIMEOUT_MS",
            "SCRIPT_MEMORY_KB",
            "SCRIPT_MAX_STEPS",
            "LOG_FILE",
        ] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn reads_numeric_overrides_from_env() {
        clear_vars();
        unsafe {
            env::set_var("GRADING_WORKERS", "3");
            env::set_var("SCRIPT_TIMEOUT_MS", "1200");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.grading_workers, 3);
        assert_eq!(cfg.script_timeout_ms, 1200);
        clear_vars();
    }

    #[test]
    #[serial]
    fn malformed_values_fall_back_to_defaults() {
        clear_vars();
        unsafe {
            env::set_var("SCRIPT_MEMORY_KB", "lots");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.script_memory_kb, AppConfig::default().script_memory_kb);
        clear_vars();
    }

    #[test]
    #[serial]
    fn blank_log_file_is_treated_as_unset() {
        clear_vars();
        unsafe {
            env::set_var("LOG_FILE", "  ");
        }
        assert!(AppConfig::from_env().log_file.is_none());
        clear_vars();
    }

    #[test]
    #[serial]
    fn setters_override_global_until_reset() {
        clear_vars();
        AppConfig::set_grading_workers(7);
        assert_eq!(AppConfig::global().grading_workers, 7);
        AppConfig::reset();
        assert_eq!(AppConfig::global().grading_workers, 0);
    }
}
