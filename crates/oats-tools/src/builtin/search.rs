//! Log search tool
//!
//! Grep-shaped: emits `path:line: content` rows, which the observation
//! funnel knows how to summarize into match and file counts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::tool::Tool;

const MAX_MATCHES: usize = 5000;

pub struct LogSearchTool;

#[async_trait]
impl Tool for LogSearchTool {
    fn name(&self) -> &str {
        "log_search"
    }

    fn description(&self) -> &str {
        "Search files under a directory for a regex pattern. Output is path:line: content rows."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex to search for"},
                "path": {"type": "string", "description": "File or directory to search (default '.')"},
                "extension": {"type": "string", "description": "Optional file extension filter, e.g. 'log'"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let pattern = input["pattern"].as_str().context("missing pattern")?;
        let root = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let extension = input.get("extension").and_then(|v| v.as_str()).map(String::from);

        let re = Regex::new(pattern).with_context(|| format!("invalid pattern '{}'", pattern))?;

        let mut files = Vec::new();
        collect_files(Path::new(root), extension.as_deref(), &mut files)
            .with_context(|| format!("failed to walk '{}'", root))?;
        files.sort();

        let mut rows = Vec::new();
        'outer: for file in &files {
            let Ok(content) = std::fs::read_to_string(file) else {
                continue; // binary or unreadable, skip
            };
            for (idx, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    rows.push(format!("{}:{}: {}", file.display(), idx + 1, line.trim_end()));
                    if rows.len() >= MAX_MATCHES {
                        break 'outer;
                    }
                }
            }
        }

        if rows.is_empty() {
            return Ok(json!(format!("no matches for '{}' under {}", pattern, root)));
        }
        Ok(json!(rows.join("\n")))
    }
}

fn collect_files(path: &Path, extension: Option<&str>, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            // Tolerate unreadable subtrees.
            let _ = collect_files(&entry_path, extension, out);
        } else if file_type.is_file() {
            let matches_ext = match extension {
                Some(ext) => entry_path.extension().and_then(|e| e.to_str()) == Some(ext),
                None => true,
            };
            if matches_ext {
                out.push(entry_path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_reports_matches_per_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("api.log"),
            "ok request\nERROR timeout upstream\nok request\nERROR refused\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("db.log"), "ERROR deadlock\n").unwrap();

        let out = LogSearchTool
            .execute(json!({"pattern": "ERROR", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();

        let text = out.as_str().unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("api.log:2: ERROR timeout upstream"));
        assert!(text.contains("db.log:1: ERROR deadlock"));
    }

    #[tokio::test]
    async fn test_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "ERROR one\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "ERROR two\n").unwrap();

        let out = LogSearchTool
            .execute(json!({
                "pattern": "ERROR",
                "path": dir.path().to_str().unwrap(),
                "extension": "log"
            }))
            .await
            .unwrap();
        let text = out.as_str().unwrap();
        assert!(text.contains("a.log"));
        assert!(!text.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_no_matches_is_informative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "all good\n").unwrap();

        let out = LogSearchTool
            .execute(json!({"pattern": "FATAL", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("no matches"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_errors() {
        let result = LogSearchTool.execute(json!({"pattern": "("})).await;
        assert!(result.is_err());
    }
}
