//! Built-in diagnostic tools
//!
//! The baseline toolkit every worker ships with: shell execution, file
//! access, and log search. Site-specific tools come in through directory
//! discovery on top of these.

pub mod file;
pub mod search;
pub mod shell;

use tracing::info;

use crate::registry::ToolRegistry;

pub use file::{CreateFileTool, ListFilesTool, ReadFileTool};
pub use search::LogSearchTool;
pub use shell::ExecuteShellTool;

/// Register all built-in tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> oats_core::Result<()> {
    registry.register(std::sync::Arc::new(ExecuteShellTool::new()))?;
    registry.register(std::sync::Arc::new(ReadFileTool))?;
    registry.register(std::sync::Arc::new(CreateFileTool))?;
    registry.register(std::sync::Arc::new(ListFilesTool))?;
    registry.register(std::sync::Arc::new(LogSearchTool))?;

    info!("Registered {} builtin tools", registry.len());
    Ok(())
}
