//! In-memory orchestrator double for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::orchestrator::{JobSpec, JobState, Orchestrator, OrchestratorError};

#[derive(Default)]
pub struct MockOrchestrator {
    created: Mutex<Vec<JobSpec>>,
    deleted: Mutex<Vec<String>>,
    states: Mutex<HashMap<String, JobState>>,
    logs: Mutex<HashMap<String, String>>,
    reject_creates: Mutex<bool>,
}

impl MockOrchestrator {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reject_creates(&self, reject: bool) {
        *self.reject_creates.lock().unwrap() = reject;
    }

    pub fn set_job_state(&self, name: &str, state: JobState) {
        self.states.lock().unwrap().insert(name.to_string(), state);
    }

    pub fn set_job_logs(&self, name: &str, logs: &str) {
        self.logs.lock().unwrap().insert(name.to_string(), logs.to_string());
    }

    pub fn created_jobs(&self) -> Vec<JobSpec> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted_jobs(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn create_job(&self, spec: &JobSpec) -> Result<(), OrchestratorError> {
        if *self.reject_creates.lock().unwrap() {
            return Err(OrchestratorError::Rejected("quota exceeded".to_string()));
        }
        self.created.lock().unwrap().push(spec.clone());
        self.states
            .lock()
            .unwrap()
            .insert(spec.name.clone(), JobState::Active);
        Ok(())
    }

    async fn job_state(&self, name: &str, _namespace: &str) -> Result<JobState, OrchestratorError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(JobState::NotFound))
    }

    async fn fetch_logs(&self, name: &str, _namespace: &str) -> Result<String, OrchestratorError> {
        Ok(self.logs.lock().unwrap().get(name).cloned().unwrap_or_default())
    }

    async fn follow_logs(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<mpsc::Receiver<String>, OrchestratorError> {
        let (tx, rx) = mpsc::channel(100);
        let lines: Vec<String> = self
            .logs
            .lock()
            .unwrap()
            .get(name)
            .map(|logs| logs.lines().map(String::from).collect())
            .unwrap_or_default();

        tokio::spawn(async move {
            for line in lines {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            // Dropping tx ends the stream, like a terminal worker.
        });

        Ok(rx)
    }

    async fn delete_job(&self, name: &str, _namespace: &str) -> Result<(), OrchestratorError> {
        self.deleted.lock().unwrap().push(name.to_string());
        self.states
            .lock()
            .unwrap()
            .insert(name.to_string(), JobState::NotFound);
        Ok(())
    }

    fn log_stream_hint(&self, name: &str, namespace: &str) -> String {
        format!("mock logs {} -n {}", name, namespace)
    }
}
