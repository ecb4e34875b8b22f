//! Environment Configuration
//!
//! All runtime knobs are read from the environment. The worker receives its
//! configuration from the orchestrator job manifest; the server reads the
//! same helpers at startup. Existing environment variables always win over
//! defaults.

use tracing::debug;

use crate::error::{CoreError, Result};

/// Goal for the investigation (required in the worker)
pub const ENV_GOAL: &str = "OATS_GOAL";
/// Maximum number of agent turns
pub const ENV_MAX_TURNS: &str = "OATS_MAX_TURNS";
/// Directory the worker writes its final-result artifact into
pub const ENV_RESULTS_DIR: &str = "OATS_RESULTS_DIR";
/// Directory scanned for declarative tool manifests
pub const ENV_TOOLS_DIR: &str = "OATS_TOOLS_DIR";

pub const ENV_LLM_PROVIDER: &str = "UFFLOW_LLM_PROVIDER";
pub const ENV_LLM_MODEL: &str = "UFFLOW_LLM_MODEL";
pub const ENV_TEMPERATURE: &str = "UFFLOW_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "UFFLOW_MAX_TOKENS";
pub const ENV_PROMPT_VERSION: &str = "UFFLOW_PROMPT_VERSION";
pub const ENV_LOG_LEVEL: &str = "UFFLOW_LOG_LEVEL";

pub const DEFAULT_MAX_TURNS: u32 = 15;
pub const DEFAULT_RESULTS_DIR: &str = "/output";
pub const DEFAULT_TOOLS_DIR: &str = "/etc/oats/tools";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_PROMPT_VERSION: &str = "v3";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get a boolean configuration value.
pub fn get_config_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get a float configuration value.
pub fn get_config_float(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Worker-side configuration, resolved from the job environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub goal: String,
    pub max_turns: u32,
    pub results_dir: String,
    pub tools_dir: String,
    pub prompt_version: String,
    pub log_level: String,
}

impl WorkerConfig {
    /// Resolve the worker configuration from the environment.
    ///
    /// A missing goal is fatal: the job was mis-created and there is nothing
    /// to investigate.
    pub fn from_env() -> Result<Self> {
        let goal = get_config_opt(ENV_GOAL)
            .ok_or_else(|| CoreError::configuration_error(format!("{ENV_GOAL} is not set")))?;

        let max_turns = get_config_int(ENV_MAX_TURNS, DEFAULT_MAX_TURNS as i64).max(1) as u32;

        let config = Self {
            goal,
            max_turns,
            results_dir: get_config(ENV_RESULTS_DIR, DEFAULT_RESULTS_DIR),
            tools_dir: get_config(ENV_TOOLS_DIR, DEFAULT_TOOLS_DIR),
            prompt_version: get_config(ENV_PROMPT_VERSION, DEFAULT_PROMPT_VERSION),
            log_level: get_config(ENV_LOG_LEVEL, DEFAULT_LOG_LEVEL),
        };

        debug!("Worker config: max_turns={}, results_dir={}", config.max_turns, config.results_dir);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_int_parses() {
        std::env::set_var("OATS_TEST_INT", "42");
        assert_eq!(get_config_int("OATS_TEST_INT", 7), 42);
        std::env::remove_var("OATS_TEST_INT");
        assert_eq!(get_config_int("OATS_TEST_INT", 7), 7);
    }

    #[test]
    fn test_get_config_bool_variants() {
        std::env::set_var("OATS_TEST_BOOL", "yes");
        assert!(get_config_bool("OATS_TEST_BOOL", false));
        std::env::set_var("OATS_TEST_BOOL", "off");
        assert!(!get_config_bool("OATS_TEST_BOOL", true));
        std::env::remove_var("OATS_TEST_BOOL");
    }

    #[test]
    fn test_worker_config_requires_goal() {
        std::env::remove_var(ENV_GOAL);
        assert!(WorkerConfig::from_env().is_err());
    }
}
