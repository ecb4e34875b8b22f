//! Shell execution tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::tool::Tool;

/// Execute a shell command whose leading program is whitelisted.
///
/// Pipelines and redirection are allowed because investigations lean on
/// them (the funnel guidance tells the agent to redirect large results to
/// files), but every command in the pipeline must start from a whitelisted
/// program.
pub struct ExecuteShellTool {
    allowed_commands: Vec<String>,
}

impl ExecuteShellTool {
    pub fn new() -> Self {
        Self {
            allowed_commands: vec![
                "ls", "cat", "grep", "find", "head", "tail", "wc", "sort", "uniq", "awk", "sed",
                "echo", "pwd", "date", "uname", "df", "du", "free", "uptime",
                "ps", "top", "ip", "ss", "netstat", "ping", "dig", "curl",
                "kubectl", "journalctl", "systemctl", "docker",
                "git", "python3", "sh",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    fn first_program(command: &str) -> Option<&str> {
        command.split_whitespace().next()
    }
}

impl Default for ExecuteShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExecuteShellTool {
    fn name(&self) -> &str {
        "execute_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command (whitelisted programs only). Use redirection (> file.txt) for large outputs."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Optional timeout in seconds (default 60)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing command"))?;

        let program = Self::first_program(command)
            .ok_or_else(|| anyhow::anyhow!("empty command"))?;
        if !self.allowed_commands.iter().any(|c| c == program) {
            return Ok(json!({
                "success": false,
                "error": format!("command '{}' is not whitelisted", program)
            }));
        }

        let timeout_secs = input.get("timeout_secs").and_then(|v| v.as_u64()).unwrap_or(60);

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            tokio::process::Command::new("sh").arg("-c").arg(command).output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(json!({
                "success": output.status.success(),
                "return_code": output.status.code(),
                "stdout": String::from_utf8_lossy(&output.stdout),
                "stderr": String::from_utf8_lossy(&output.stderr),
            })),
            Ok(Err(e)) => Ok(json!({"success": false, "error": e.to_string()})),
            Err(_) => Ok(json!({
                "success": false,
                "error": format!("command timed out after {}s", timeout_secs)
            })),
        }
    }
}
