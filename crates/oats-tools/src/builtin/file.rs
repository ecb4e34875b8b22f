//! File access tools

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::Tool;

/// Read a file, optionally a line range.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file. Supports optional 1-based start_line/end_line for targeted reads."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "description": "Path of the file to read"},
                "start_line": {"type": "integer", "description": "Optional 1-based first line"},
                "end_line": {"type": "integer", "description": "Optional 1-based last line"}
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let filename = input["filename"].as_str().context("missing filename")?;
        let content = tokio::fs::read_to_string(filename)
            .await
            .with_context(|| format!("failed to read '{}'", filename))?;

        let start = input.get("start_line").and_then(|v| v.as_u64());
        let end = input.get("end_line").and_then(|v| v.as_u64());

        if let Some(start) = start {
            let lines: Vec<&str> = content.lines().collect();
            let start_idx = (start.max(1) as usize) - 1;
            // Default window of 20 lines when no end is given.
            let end_idx = end.map(|e| e as usize).unwrap_or(start_idx + 20).min(lines.len());
            if start_idx >= lines.len() {
                anyhow::bail!("start_line {} is past the end of '{}' ({} lines)", start, filename, lines.len());
            }
            return Ok(json!(lines[start_idx..end_idx].join("\n")));
        }

        Ok(json!(content))
    }
}

/// Create or overwrite a file.
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a file with the given content, creating parent directories as needed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "description": "Path of the file to create"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["filename", "content"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let filename = input["filename"].as_str().context("missing filename")?;
        let content = input["content"].as_str().context("missing content")?;

        if let Some(parent) = std::path::Path::new(filename).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
        tokio::fs::write(filename, content)
            .await
            .with_context(|| format!("failed to write '{}'", filename))?;

        Ok(json!({"filepath": filename, "size": content.len()}))
    }
}

/// List directory entries.
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list (default '.')"}
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let path = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let mut entries = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("failed to list '{}'", path))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().to_string();
            names.push(if file_type.is_dir() { format!("{}/", name) } else { name });
        }
        names.sort();
        Ok(json!(names.join("\n")))
    }
}
