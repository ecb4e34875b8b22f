//! Agent state models
//!
//! The structured working memory of one investigation. The oracle echoes a
//! proposed `AgentState` every turn; the engine merges it under the
//! invariants enforced in `engine::merge_state` (facts never shrink, at
//! most one active task, engine-owned turn counters).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a decomposed sub-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Done,
    Blocked,
}

/// One sub-task of the overall goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u32,
    #[serde(alias = "desc")]
    pub description: String,
    pub status: TaskStatus,
}

/// Classification of the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    Investigate,
    Create,
    Modify,
    Provision,
    Unorthodox,
}

impl Archetype {
    /// Canonical phase progression for this archetype.
    ///
    /// `Unorthodox` tasks have no fixed progression; any phase label is
    /// accepted for them.
    pub fn canonical_phases(&self) -> &'static [&'static str] {
        match self {
            Archetype::Investigate => &["Gather", "Hypothesize", "Test", "Isolate", "Conclude"],
            Archetype::Create => &["Requirements", "Draft", "Validate", "Refine", "Done"],
            Archetype::Modify => &["Understand", "Backup", "Implement", "Verify", "Done"],
            Archetype::Provision => &["Check", "Install", "Verify"],
            Archetype::Unorthodox => &[],
        }
    }

    pub fn is_valid_phase(&self, phase: &str) -> bool {
        match self {
            Archetype::Unorthodox => true,
            _ => self.canonical_phases().contains(&phase),
        }
    }
}

/// The currently active task with its advisory metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveTask {
    pub id: u32,
    pub archetype: Archetype,
    pub phase: String,
    /// Engine-controlled: incremented while the same task id stays active,
    /// reset when it changes.
    #[serde(default)]
    pub turns_on_task: u32,
}

/// Testable hypothesis carried in the strategize section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hypothesis {
    #[serde(default)]
    pub claim: String,
    #[serde(default)]
    pub test: String,
    #[serde(default)]
    pub signal: String,
}

/// Reflection on the previous turn's outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReflectSection {
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub insight: String,
}

/// Strategy for the next action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StrategizeSection {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub hypothesis: Option<Hypothesis>,
    #[serde(default, alias = "ifInvalidated")]
    pub if_invalidated: Option<String>,
}

/// The agent's complete working memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub goal: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub active: Option<ActiveTask>,
    /// Observed truths, deduplicated by textual identity. Never shrinks.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Invalidated hypotheses. Never shrinks.
    #[serde(default)]
    pub ruled_out: Vec<String>,
    /// Open questions; the oracle may resolve these.
    #[serde(default)]
    pub unknowns: Vec<String>,
}

impl AgentState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            tasks: Vec::new(),
            active: None,
            facts: Vec::new(),
            ruled_out: Vec::new(),
            unknowns: Vec::new(),
        }
    }

    /// Count of tasks currently marked active.
    pub fn active_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Active).count()
    }

    pub fn all_tasks_done(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Done)
    }
}

/// The action the oracle selected for this turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionCall {
    #[serde(alias = "tool_name")]
    pub tool: String,
    #[serde(default = "default_params", alias = "parameters")]
    pub params: Value,
    /// Legacy replies carry the finish reason beside the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Name of the distinguished completion tool.
pub const FINISH_TOOL: &str = "finish";

impl ActionCall {
    pub fn is_finish(&self) -> bool {
        self.tool == FINISH_TOOL
    }

    /// Result text of a finish action.
    pub fn finish_result(&self) -> String {
        self.params
            .get("result")
            .or_else(|| self.params.get("reason"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.reason.clone())
            .unwrap_or_else(|| "goal completed".to_string())
    }
}

/// One completed turn. Entries are immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub turn: u32,
    pub thought: String,
    pub action: ActionCall,
    pub observation: String,
    pub duration_ms: u64,
}

/// Final outcome of one engine run.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub success: bool,
    pub state: AgentState,
    pub transcript: Vec<TranscriptEntry>,
    pub turns_used: u32,
    pub final_result: Option<String>,
    pub summary: String,
}
