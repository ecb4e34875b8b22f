//! oats-tools: tool registry and execution engine
//!
//! This crate provides the worker-side tool management system: the uniform
//! tool contract, the registry, directory-based discovery of declarative
//! tools, and the executor with the three-layer observation funnel for
//! oversized outputs.

pub mod builtin;
pub mod discovery;
pub mod executor;
pub mod funnel;
pub mod registry;
pub mod tool;

pub use builtin::register_builtin_tools;
pub use executor::{ExecutorConfig, ToolExecutor};
pub use funnel::ObservationSummary;
pub use registry::ToolRegistry;
pub use tool::{BoxedTool, Tool, ToolDescriptor, ToolResult, ToolStatus};
