//! Tool discovery
//!
//! Walks a directory of declarative tool manifests at worker startup and
//! registers each one. A manifest is a JSON file describing a
//! command-backed tool: name, version, description, input schema, and an
//! argv template whose `{param}` placeholders are filled from the validated
//! input. Malformed manifests are logged and skipped; discovery never takes
//! the worker down.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::registry::ToolRegistry;
use crate::tool::Tool;

/// Declarative description of a command-backed tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub description: String,
    pub input_schema: Value,
    /// Argv template. Elements may contain `{param}` placeholders.
    pub command: Vec<String>,
    /// Per-invocation timeout override, seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Tool implementation backed by a manifest's command template.
pub struct ManifestTool {
    manifest: ToolManifest,
}

impl ManifestTool {
    pub fn new(manifest: ToolManifest) -> Self {
        Self { manifest }
    }

    /// Fill `{param}` placeholders from the input object.
    fn render_argv(&self, input: &Value) -> Vec<String> {
        self.manifest
            .command
            .iter()
            .map(|part| {
                let mut rendered = part.clone();
                if let Some(object) = input.as_object() {
                    for (key, value) in object {
                        let placeholder = format!("{{{}}}", key);
                        if rendered.contains(&placeholder) {
                            let text = match value {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            rendered = rendered.replace(&placeholder, &text);
                        }
                    }
                }
                rendered
            })
            .collect()
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn version(&self) -> &str {
        &self.manifest.version
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn input_schema(&self) -> Value {
        self.manifest.input_schema.clone()
    }

    async fn execute(&self, input: Value) -> AnyResult<Value> {
        let argv = self.render_argv(&input);
        let (program, args) = argv
            .split_first()
            .context("manifest command is empty")?;

        debug!("Running manifest tool '{}': {:?}", self.manifest.name, argv);
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn '{}'", program))?;

        Ok(json!({
            "success": output.status.success(),
            "exit_code": output.status.code(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        }))
    }
}

/// Load every valid manifest under `root`.
///
/// A missing directory is not an error (workers without site-specific
/// tools simply run with the builtins), but a directory that exists and
/// cannot be read is fatal to worker startup.
pub fn discover_manifests(root: &Path) -> oats_core::Result<Vec<ToolManifest>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Tool directory {} does not exist, skipping discovery", root.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(oats_core::CoreError::configuration_error(format!(
                "tool directory {} is unreadable: {}",
                root.display(),
                e
            )));
        }
    };

    let mut manifests = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match load_manifest(&path) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => {
                warn!("Skipping malformed tool manifest {}: {}", path.display(), e);
            }
        }
    }

    // Stable registration order regardless of directory iteration order.
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(manifests)
}

fn load_manifest(path: &Path) -> AnyResult<ToolManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: ToolManifest =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;

    if manifest.command.is_empty() {
        anyhow::bail!("manifest '{}' has an empty command", manifest.name);
    }
    if !manifest.input_schema.is_object() {
        anyhow::bail!("manifest '{}' input_schema is not an object", manifest.name);
    }
    Ok(manifest)
}

/// Discover tools under `root` and register them.
///
/// Duplicates (e.g. a manifest shadowing a builtin) are logged and skipped.
pub fn register_discovered(registry: &mut ToolRegistry, root: &Path) -> oats_core::Result<usize> {
    let manifests = discover_manifests(root)?;
    let mut count = 0usize;

    for manifest in manifests {
        let name = manifest.name.clone();
        match registry.register(Arc::new(ManifestTool::new(manifest))) {
            Ok(()) => count += 1,
            Err(e) => warn!("Skipping discovered tool '{}': {}", name, e),
        }
    }

    if count > 0 {
        info!("Registered {} discovered tools from {}", count, root.display());
    }
    Ok(count)
}
