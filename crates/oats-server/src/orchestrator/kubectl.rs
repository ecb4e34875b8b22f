//! kubectl-backed orchestrator
//!
//! Drives the cluster through the kubectl CLI: `apply` for job creation,
//! `get -o json` for status, `logs` / `logs -f` for retained and live
//! streams, `delete` for cancellation. Log following spawns the child
//! process and forwards stdout line by line over a channel; dropping the
//! receiver kills the child.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{JobSpec, JobState, Orchestrator, OrchestratorError};

/// Name of the orchestrator-managed secret holding oracle credentials.
const ORACLE_SECRET_NAME: &str = "oats-oracle-credentials";

pub struct KubectlOrchestrator {
    kubectl: String,
}

impl KubectlOrchestrator {
    pub fn new() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
        }
    }

    pub fn with_binary(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, OrchestratorError> {
        Command::new(&self.kubectl)
            .args(args)
            .output()
            .await
            .map_err(|e| OrchestratorError::Unavailable(format!("failed to run kubectl: {}", e)))
    }
}

impl Default for KubectlOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the batch/v1 Job manifest for a worker.
///
/// `restartPolicy: Never` and `backoffLimit: 0` make the exit code the
/// single source of truth; `ttlSecondsAfterFinished` lets the orchestrator
/// reclaim terminal jobs on its own.
pub fn build_job_manifest(spec: &JobSpec) -> Value {
    json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": spec.name,
            "namespace": spec.namespace,
            "labels": {
                "app": "oats-worker"
            }
        },
        "spec": {
            "backoffLimit": 0,
            "ttlSecondsAfterFinished": spec.ttl_seconds,
            "template": {
                "metadata": {
                    "labels": {
                        "app": "oats-worker",
                        "job-name": spec.name
                    }
                },
                "spec": {
                    "restartPolicy": "Never",
                    "containers": [{
                        "name": "worker",
                        "image": spec.image,
                        "env": [
                            {"name": "OATS_GOAL", "value": spec.goal},
                            {"name": "OATS_MAX_TURNS", "value": spec.turn_budget.to_string()},
                            {
                                "name": "ANTHROPIC_API_KEY",
                                "valueFrom": {
                                    "secretKeyRef": {
                                        "name": ORACLE_SECRET_NAME,
                                        "key": "api-key",
                                        "optional": true
                                    }
                                }
                            },
                            {
                                "name": "OPENAI_API_KEY",
                                "valueFrom": {
                                    "secretKeyRef": {
                                        "name": ORACLE_SECRET_NAME,
                                        "key": "openai-api-key",
                                        "optional": true
                                    }
                                }
                            }
                        ]
                    }]
                }
            }
        }
    })
}

#[async_trait]
impl Orchestrator for KubectlOrchestrator {
    async fn create_job(&self, spec: &JobSpec) -> Result<(), OrchestratorError> {
        let manifest = build_job_manifest(spec);

        let mut child = Command::new(&self.kubectl)
            .args(["apply", "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OrchestratorError::Unavailable(format!("failed to run kubectl: {}", e)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            let body = manifest.to_string();
            stdin
                .write_all(body.as_bytes())
                .await
                .map_err(|e| OrchestratorError::Unavailable(format!("kubectl stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OrchestratorError::Unavailable(format!("kubectl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OrchestratorError::Rejected(stderr));
        }

        info!("Created job {} in namespace {}", spec.name, spec.namespace);
        Ok(())
    }

    async fn job_state(&self, name: &str, namespace: &str) -> Result<JobState, OrchestratorError> {
        let output = self
            .run(&["get", "job", name, "-n", namespace, "-o", "json"])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("NotFound") || stderr.contains("not found") {
                return Ok(JobState::NotFound);
            }
            return Err(OrchestratorError::Unavailable(stderr.trim().to_string()));
        }

        let job: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| OrchestratorError::Unavailable(format!("bad job JSON: {}", e)))?;
        Ok(parse_job_status(&job))
    }

    async fn fetch_logs(&self, name: &str, namespace: &str) -> Result<String, OrchestratorError> {
        let job_ref = format!("job/{}", name);
        let output = self.run(&["logs", &job_ref, "-n", namespace]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("NotFound") || stderr.contains("not found") {
                return Err(OrchestratorError::NotFound(name.to_string()));
            }
            return Err(OrchestratorError::Unavailable(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn follow_logs(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<mpsc::Receiver<String>, OrchestratorError> {
        let (tx, rx) = mpsc::channel(100);
        let job_ref = format!("job/{}", name);

        let mut child = Command::new(&self.kubectl)
            .args(["logs", "-f", &job_ref, "-n", namespace])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| OrchestratorError::Unavailable(format!("failed to run kubectl: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OrchestratorError::Unavailable("kubectl gave no stdout".to_string()))?;

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(line).await.is_err() {
                    // Receiver dropped: client detached.
                    break;
                }
            }
            let _ = child.kill().await;
            debug!("Log follow ended");
        });

        Ok(rx)
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), OrchestratorError> {
        let output = self
            .run(&[
                "delete", "job", name, "-n", namespace, "--ignore-not-found", "--wait=false",
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Job deletion failed for {}: {}", name, stderr);
            return Err(OrchestratorError::Unavailable(stderr));
        }

        info!("Deleted job {} in namespace {}", name, namespace);
        Ok(())
    }

    fn log_stream_hint(&self, name: &str, namespace: &str) -> String {
        format!("kubectl logs -f job/{} -n {}", name, namespace)
    }
}

/// Map a batch/v1 Job status object to our job state.
fn parse_job_status(job: &Value) -> JobState {
    let status = &job["status"];
    let count = |field: &str| status.get(field).and_then(|v| v.as_u64()).unwrap_or(0);

    if count("succeeded") > 0 {
        JobState::Succeeded
    } else if count("failed") > 0 {
        JobState::Failed
    } else if count("active") > 0 {
        JobState::Active
    } else {
        JobState::Pending
    }
}
