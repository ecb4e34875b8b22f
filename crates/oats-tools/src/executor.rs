//! Tool executor
//!
//! Invokes one tool synchronously with schema validation, a per-call
//! timeout, and the observation funnel for oversized results. Every failure
//! mode here is recoverable from the agent's point of view: lookup misses,
//! validation errors, handler errors, timeouts, and scratch-directory I/O
//! problems all come back as failure `ToolResult`s, never as panics or
//! crashed loops.

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::funnel;
use crate::registry::ToolRegistry;
use crate::tool::ToolResult;

/// Configuration for tool execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-call timeout for tool handlers
    pub call_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(300),
        }
    }
}

/// Tool executor bound to one worker's scratch directory.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    scratch_dir: PathBuf,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, scratch_dir: impl Into<PathBuf>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            scratch_dir: scratch_dir.into(),
            config,
        }
    }

    pub fn with_defaults(registry: Arc<ToolRegistry>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self::new(registry, scratch_dir, ExecutorConfig::default())
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a tool by name with raw, unvalidated parameters.
    pub async fn execute(&self, name: &str, raw_params: Value) -> ToolResult {
        let start = std::time::Instant::now();
        let elapsed_ms = |start: std::time::Instant| start.elapsed().as_millis() as u64;

        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(_) => {
                let available: Vec<String> =
                    self.registry.list().into_iter().map(|d| d.name).collect();
                return ToolResult::failure(
                    format!("unknown tool '{}'. Available tools: {}", name, available.join(", ")),
                    elapsed_ms(start),
                );
            }
        };

        if let Err(message) = validate_params(&tool.input_schema(), &raw_params) {
            debug!("Parameter validation failed for {}: {}", name, message);
            return ToolResult::failure(message, elapsed_ms(start));
        }

        debug!("Executing tool '{}'", name);
        let outcome = timeout(self.config.call_timeout, tool.execute(raw_params)).await;

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", name, e);
                return ToolResult::failure(e.to_string(), elapsed_ms(start));
            }
            Err(_) => {
                warn!(
                    "Tool '{}' timed out after {}s",
                    name,
                    self.config.call_timeout.as_secs()
                );
                return ToolResult::failure(
                    format!("tool execution timed out after {}s", self.config.call_timeout.as_secs()),
                    elapsed_ms(start),
                );
            }
        };

        let rendered = render_output(&value);
        match funnel::apply(tool.name(), &rendered, &self.scratch_dir) {
            Ok(Some(funneled)) => {
                let mut result = ToolResult::success(funneled.guided_output, elapsed_ms(start));
                result.summary = Some(funneled.summary);
                result
            }
            Ok(None) => ToolResult::success(rendered, elapsed_ms(start)),
            Err(e) => {
                // Scratch I/O failure: the call still resolves, as a failure
                // observation the agent can see.
                warn!("Scratch spill failed for '{}': {}", name, e);
                ToolResult::failure(format!("failed to spill large output: {}", e), elapsed_ms(start))
            }
        }
    }
}

/// Validate raw parameters against a tool's JSON Schema.
fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| format!("invalid tool schema: {}", e))?;

    if let Err(error) = validator.validate(params) {
        return Err(format!("invalid parameters: {} (at {})", error, error.instance_path));
    }
    Ok(())
}

/// Stringify a handler's output for the observation.
fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolStatus};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use serde_json::json;

    struct UptimeCheckTool;

    #[async_trait]
    impl Tool for UptimeCheckTool {
        fn name(&self) -> &str {
            "uptime_check"
        }
        fn description(&self) -> &str {
            "Report service uptime"
        }
        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string"}
                },
                "required": ["service"]
            })
        }
        async fn execute(&self, input: Value) -> AnyResult<Value> {
            let service = input["service"].as_str().unwrap_or("unknown");
            Ok(json!(format!("{} up 14 days", service)))
        }
    }

    struct NoisyTool {
        lines: usize,
    }

    #[async_trait]
    impl Tool for NoisyTool {
        fn name(&self) -> &str {
            "noisy"
        }
        fn description(&self) -> &str {
            "Emit many lines"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _input: Value) -> AnyResult<Value> {
            let out = (0..self.lines)
                .map(|i| format!("entry {}", i))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(json!(out))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _input: Value) -> AnyResult<Value> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("too late"))
        }
    }

    fn executor_with(tools: Vec<crate::tool::BoxedTool>, scratch: &std::path::Path) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        ToolExecutor::with_defaults(registry.into_shared(), scratch)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recoverable() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = executor_with(vec![Arc::new(UptimeCheckTool)], scratch.path());

        let result = executor.execute("nonexistent", json!({})).await;
        assert_eq!(result.status, ToolStatus::Failure);
        let error = result.error.unwrap();
        assert!(error.contains("unknown tool"));
        assert!(error.contains("uptime_check"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_reported() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = executor_with(vec![Arc::new(UptimeCheckTool)], scratch.path());

        let result = executor.execute("uptime_check", json!({})).await;
        assert_eq!(result.status, ToolStatus::Failure);
        assert!(result.error.unwrap().contains("invalid parameters"));
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = executor_with(vec![Arc::new(UptimeCheckTool)], scratch.path());

        let result = executor.execute("uptime_check", json!({"service": "nginx"})).await;
        assert!(result.is_success());
        assert_eq!(result.output, "nginx up 14 days");
        assert!(result.summary.is_none());
    }

    #[tokio::test]
    async fn test_large_output_is_funneled() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = executor_with(vec![Arc::new(NoisyTool { lines: 500 })], scratch.path());

        let result = executor.execute("noisy", json!({})).await;
        assert!(result.is_success());
        assert!(result.output.contains(funnel::LARGE_OUTPUT_MARKER));

        let summary = result.summary.expect("summary present when funneled");
        assert_eq!(summary.total_lines, 500);
        assert!(std::path::Path::new(&summary.full_output_path).exists());
    }

    #[tokio::test]
    async fn test_boundary_output_is_not_funneled() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = executor_with(vec![Arc::new(NoisyTool { lines: 50 })], scratch.path());

        let result = executor.execute("noisy", json!({})).await;
        assert!(result.is_success());
        assert!(result.summary.is_none());
        assert!(!result.output.contains(funnel::LARGE_OUTPUT_MARKER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_produces_failure_result() {
        let scratch = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).unwrap();
        let executor = ToolExecutor::new(
            registry.into_shared(),
            scratch.path(),
            ExecutorConfig {
                call_timeout: Duration::from_secs(1),
            },
        );

        let result = executor.execute("slow", json!({})).await;
        assert_eq!(result.status, ToolStatus::Failure);
        assert!(result.error.unwrap().contains("timed out"));
    }
}
