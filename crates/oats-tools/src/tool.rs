//! Core Tool trait and result types
//!
//! Every diagnostic capability the agent can invoke satisfies this one
//! contract: a name, a version, a JSON Schema for its input, and an async
//! handler. Handler errors are data, not panics; the executor turns them
//! into failure observations the agent can react to.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::funnel::ObservationSummary;

/// Core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (unique within a registry)
    fn name(&self) -> &str;

    /// Semantic version of the tool
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON Schema for input validation
    fn input_schema(&self) -> Value;

    /// Execute the tool with validated input
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Type alias for shared tool handles
pub type BoxedTool = Arc<dyn Tool>;

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// Immutable, serializable record describing a registered tool.
///
/// This is what the reasoning engine sees: the handler itself never leaves
/// the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            version: tool.version().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
        }
    }
}

/// Outcome status of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Failure,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Failure => "failure",
        }
    }
}

/// Result of a single tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    /// Rendered output. For funneled results this is the guided preview,
    /// never the full payload.
    pub output: String,
    /// Present iff status is failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Present iff the observation funnel was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ObservationSummary>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: ToolStatus::Success,
            output: output.into(),
            error: None,
            duration_ms,
            summary: None,
        }
    }

    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        let error = error.into();
        Self {
            status: ToolStatus::Failure,
            output: String::new(),
            error: Some(error),
            duration_ms,
            summary: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}
