//! Tool registry
//!
//! The registry is built once in the worker entrypoint (builtins first,
//! then directory discovery) and is read-only afterwards. Registration is
//! `&mut self`; lookup and listing are `&self`, so the engine can hold a
//! shared reference for the whole run.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use oats_core::{CoreError, Result};

use crate::tool::{BoxedTool, Tool, ToolDescriptor};

/// In-memory tool registry.
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
    /// Registration order, for stable listings.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Names are unique per registry instance.
    pub fn register(&mut self, tool: BoxedTool) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::duplicate_tool(name));
        }

        debug!("Registered tool: {} v{}", name, tool.version());
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    ///
    /// Accepts either a bare name (`read_file`) or a versioned reference
    /// (`read_file:1.0.0`); a versioned reference must match the registered
    /// version exactly.
    pub fn lookup(&self, name: &str) -> Result<BoxedTool> {
        let (bare, version) = match name.split_once(':') {
            Some((n, v)) => (n, Some(v)),
            None => (name, None),
        };

        let tool = self
            .tools
            .get(bare)
            .cloned()
            .ok_or_else(|| CoreError::tool_not_found(name))?;

        if let Some(version) = version {
            if tool.version() != version {
                return Err(CoreError::tool_not_found(name));
            }
        }
        Ok(tool)
    }

    /// Descriptor for a single tool.
    pub fn describe(&self, name: &str) -> Result<ToolDescriptor> {
        self.lookup(name).map(|t| ToolDescriptor::from_tool(t.as_ref()))
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDescriptor::from_tool(t.as_ref()))
            .collect()
    }

    /// Registered tool count.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Freeze the registry into a shared handle for the engine.
    pub fn into_shared(self) -> Arc<ToolRegistry> {
        Arc::new(self)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
