//! Application state
//!
//! The in-memory investigation registry plus one lifecycle watcher task per
//! running investigation. Nothing here is durable: the orchestrator owns
//! the jobs and their log retention, the plane only tracks what it has
//! created since startup.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use oats_core::investigation::{new_investigation_id, Investigation, InvestigationState};
use oats_core::{event, AgentEvent};

use crate::config::ServerConfig;
use crate::orchestrator::{JobSpec, JobState, Orchestrator, OrchestratorError};

/// Shared state for all handlers.
pub struct AppState {
    pub orchestrator: Arc<dyn Orchestrator>,
    pub config: ServerConfig,
    investigations: RwLock<HashMap<String, Investigation>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            config,
            investigations: RwLock::new(HashMap::new()),
        })
    }

    /// Create an investigation and materialize its worker job.
    ///
    /// On orchestrator acceptance the investigation transitions to Running
    /// and a lifecycle watcher is spawned. On rejection the record is kept
    /// as Failed and the error is returned for the HTTP response.
    pub async fn create_investigation(
        self: &Arc<Self>,
        goal: String,
        namespace: String,
        turn_budget: u32,
    ) -> Result<Investigation, OrchestratorError> {
        let id = new_investigation_id();
        let investigation = Investigation::new(id.clone(), goal.clone(), namespace.clone(), turn_budget);
        let job_name = investigation.job_name.clone();

        self.investigations
            .write()
            .await
            .insert(id.clone(), investigation);

        let spec = JobSpec {
            name: job_name.clone(),
            namespace: namespace.clone(),
            goal,
            turn_budget,
            image: self.config.worker_image.clone(),
            ttl_seconds: self.config.job_ttl.as_secs(),
        };

        match self.orchestrator.create_job(&spec).await {
            Ok(()) => {
                let updated = self
                    .apply_transition(&id, InvestigationState::Running, None)
                    .await
                    .expect("record inserted above");
                self.spawn_watcher(id.clone(), job_name, namespace);
                Ok(updated)
            }
            Err(e) => {
                warn!("Orchestrator rejected investigation {}: {}", id, e);
                self.apply_transition(&id, InvestigationState::Failed, Some(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Investigation> {
        self.investigations.read().await.get(id).cloned()
    }

    /// Request cancellation. Idempotent: terminal investigations are
    /// returned unchanged.
    pub async fn cancel(&self, id: &str) -> Option<Investigation> {
        let current = self.get(id).await?;
        if current.state.is_terminal() {
            return Some(current);
        }

        // Transition first so the watcher can't misread the disappearing
        // job as a failure.
        let cancelled = self.apply_transition(id, InvestigationState::Cancelled, None).await;

        // Best-effort: the worker may finish a tool call before the
        // termination signal lands.
        if let Err(e) = self
            .orchestrator
            .delete_job(&current.job_name, &current.namespace)
            .await
        {
            warn!("Job deletion for {} failed: {}", id, e);
        }

        cancelled
    }

    /// Apply a lifecycle transition, honoring terminal immutability.
    async fn apply_transition(
        &self,
        id: &str,
        next: InvestigationState,
        error: Option<String>,
    ) -> Option<Investigation> {
        let mut investigations = self.investigations.write().await;
        let investigation = investigations.get_mut(id)?;

        if investigation.transition(next) {
            if let Some(error) = error {
                investigation.error = Some(error);
            }
            info!("Investigation {} -> {}", id, next);
        }
        Some(investigation.clone())
    }

    /// One watcher task per investigation: polls the orchestrator, applies
    /// terminal transitions, and enforces the hard wall-clock deadline.
    fn spawn_watcher(self: &Arc<Self>, id: String, job_name: String, namespace: String) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(state.config.poll_interval).await;

                let Some(current) = state.get(&id).await else { break };
                if current.state.is_terminal() {
                    break;
                }

                let age = Utc::now().signed_duration_since(current.created_at);
                let deadline = chrono::Duration::from_std(state.config.hard_deadline)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1800));
                if age > deadline {
                    warn!("Investigation {} exceeded the hard deadline", id);
                    let _ = state.orchestrator.delete_job(&job_name, &namespace).await;
                    state
                        .apply_transition(&id, InvestigationState::TimedOut, Some("hard deadline exceeded".into()))
                        .await;
                    break;
                }

                match state.orchestrator.job_state(&job_name, &namespace).await {
                    Ok(JobState::Succeeded) => {
                        state.apply_transition(&id, InvestigationState::Succeeded, None).await;
                        break;
                    }
                    Ok(JobState::Failed) => {
                        state
                            .apply_transition(&id, InvestigationState::Failed, Some("worker exited non-zero".into()))
                            .await;
                        break;
                    }
                    Ok(JobState::NotFound) => {
                        state
                            .apply_transition(&id, InvestigationState::Failed, Some("worker job disappeared".into()))
                            .await;
                        break;
                    }
                    Ok(JobState::Pending) | Ok(JobState::Active) => {}
                    Err(e) => {
                        // Transient orchestrator hiccups: keep polling.
                        warn!("Status poll for {} failed: {}", id, e);
                    }
                }
            }
        });
    }

    /// Replay the retained event stream for an investigation.
    pub async fn replay_events(&self, id: &str) -> Result<Vec<AgentEvent>, OrchestratorError> {
        let investigation = self
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;

        let logs = self
            .orchestrator
            .fetch_logs(&investigation.job_name, &investigation.namespace)
            .await?;

        Ok(logs.lines().filter_map(event::parse_event_line).collect())
    }
}
