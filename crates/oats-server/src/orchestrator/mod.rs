//! Orchestrator interface
//!
//! The control plane treats the orchestrator as a scheduler with four
//! primitives: create an ephemeral job, read its state, stream its logs,
//! delete it. The production implementation shells out to kubectl; tests
//! use an in-memory double.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod kubectl;

pub use kubectl::KubectlOrchestrator;

/// Everything needed to materialize one worker job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub namespace: String,
    pub goal: String,
    pub turn_budget: u32,
    pub image: String,
    /// Seconds the orchestrator retains the job after it finishes.
    pub ttl_seconds: u64,
}

/// Orchestrator-side view of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted but no container running yet.
    Pending,
    /// Worker container is running.
    Active,
    /// Worker exited 0.
    Succeeded,
    /// Worker exited non-zero.
    Failed,
    /// Job is gone (never existed, or already reclaimed).
    NotFound,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("orchestrator rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create an ephemeral single-container job. No restarts on failure;
    /// the exit code is the worker's only outward success signal.
    async fn create_job(&self, spec: &JobSpec) -> Result<(), OrchestratorError>;

    /// Read the job's current state.
    async fn job_state(&self, name: &str, namespace: &str) -> Result<JobState, OrchestratorError>;

    /// Fetch retained logs (for replay after the fact).
    async fn fetch_logs(&self, name: &str, namespace: &str) -> Result<String, OrchestratorError>;

    /// Follow the job's log stream line by line.
    async fn follow_logs(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<mpsc::Receiver<String>, OrchestratorError>;

    /// Delete the job; the worker receives process termination.
    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), OrchestratorError>;

    /// A copy-pasteable follow command returned to clients.
    fn log_stream_hint(&self, name: &str, namespace: &str) -> String;
}
