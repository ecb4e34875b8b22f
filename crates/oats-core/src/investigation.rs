//! Investigation Lifecycle
//!
//! An investigation is the control-plane record of one worker job. Terminal
//! states are immutable: once an investigation has concluded, every further
//! transition attempt is rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl InvestigationState {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvestigationState::Succeeded
                | InvestigationState::Failed
                | InvestigationState::Cancelled
                | InvestigationState::TimedOut
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: InvestigationState) -> bool {
        use InvestigationState::*;
        match (self, next) {
            (Pending, Running) | (Pending, Failed) => true,
            (Running, Succeeded) | (Running, Failed) | (Running, Cancelled) | (Running, TimedOut) => true,
            // Cancellation can race job creation.
            (Pending, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InvestigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvestigationState::Pending => "pending",
            InvestigationState::Running => "running",
            InvestigationState::Succeeded => "succeeded",
            InvestigationState::Failed => "failed",
            InvestigationState::Cancelled => "cancelled",
            InvestigationState::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// Control-plane record for one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub goal: String,
    pub namespace: String,
    pub turn_budget: u32,
    pub job_name: String,
    pub state: InvestigationState,
    pub created_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
    /// Structured reason attached on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Investigation {
    pub fn new(id: String, goal: String, namespace: String, turn_budget: u32) -> Self {
        let job_name = job_name_for(&id);
        Self {
            id,
            goal,
            namespace,
            turn_budget,
            job_name,
            state: InvestigationState::Pending,
            created_at: Utc::now(),
            terminal_at: None,
            error: None,
        }
    }

    /// Apply a transition, enforcing terminal-state immutability.
    ///
    /// Returns `false` (leaving the record untouched) when the transition is
    /// not legal from the current state.
    pub fn transition(&mut self, next: InvestigationState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.terminal_at = Some(Utc::now());
        }
        true
    }
}

/// Allocate a fresh investigation id (short, opaque, unique).
pub fn new_investigation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Orchestrator job name derived from an investigation id.
pub fn job_name_for(id: &str) -> String {
    let short = &id[..id.len().min(8)];
    format!("investigation-{}", short)
}
