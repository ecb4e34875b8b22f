//! Server configuration

use std::time::Duration;

use oats_core::config::{get_config, get_config_int};

/// Control-plane configuration, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Default orchestrator namespace for new investigations.
    pub default_namespace: String,
    /// Container image the worker jobs run.
    pub worker_image: String,
    /// Default turn budget when the request omits one.
    pub default_turn_budget: u32,
    /// Terminal-state TTL after which the orchestrator reclaims jobs.
    pub job_ttl: Duration,
    /// Hard wall-clock deadline for a running investigation.
    pub hard_deadline: Duration,
    /// Job status poll interval for lifecycle watchers.
    pub poll_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            default_namespace: get_config("OATS_NAMESPACE", "default"),
            worker_image: get_config("OATS_WORKER_IMAGE", "oats-worker:latest"),
            default_turn_budget: get_config_int("OATS_DEFAULT_TURN_BUDGET", 15) as u32,
            job_ttl: Duration::from_secs(get_config_int("OATS_JOB_TTL_SECONDS", 300) as u64),
            hard_deadline: Duration::from_secs(get_config_int("OATS_DEADLINE_SECONDS", 1800) as u64),
            poll_interval: Duration::from_secs(get_config_int("OATS_POLL_SECONDS", 2) as u64),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            worker_image: "oats-worker:latest".to_string(),
            default_turn_budget: 15,
            job_ttl: Duration::from_secs(300),
            hard_deadline: Duration::from_secs(1800),
            poll_interval: Duration::from_secs(2),
        }
    }
}
